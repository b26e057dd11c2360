fn main() {
    if let Err(err) = brewlog_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

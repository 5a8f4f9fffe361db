fn main() {
    if let Err(err) = civic_etl::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

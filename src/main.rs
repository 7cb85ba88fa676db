fn main() {
    if let Err(e) = nhp_host::entry::run_app() {
        eprintln!("nhp-host failed: {e:#}");
        std::process::exit(1);
    }
}

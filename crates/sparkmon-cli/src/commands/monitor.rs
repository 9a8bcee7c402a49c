use sparkmon_core::ProcfsCatalog;

pub fn run(config_path: Option<&str>, refresh: Option<f64>) {
    let config = super::load_config(config_path, refresh);
    let catalog = ProcfsCatalog::new();
    let monitor = super::build_monitor(&config, &catalog);
    let mut app = crate::tui::app::App::new(monitor, catalog);
    if let Err(e) = app.run() {
        eprintln!("TUI error: {e}");
        std::process::exit(1);
    }
}

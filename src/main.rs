fn main() -> anyhow::Result<()> {
    stock_tui::cli::run()
}

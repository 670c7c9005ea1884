fn main() -> anyhow::Result<()> {
    specsift::cli::run_cli()
}

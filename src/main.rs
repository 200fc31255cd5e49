fn main() -> anyhow::Result<()> {
    taskflow::cli::run()
}

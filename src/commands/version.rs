pub fn run() -> anyhow::Result<()> {
    println!("observability-platform-operator {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

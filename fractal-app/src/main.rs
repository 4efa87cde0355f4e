fn main() -> anyhow::Result<()> {
    fractal_app::main()
}

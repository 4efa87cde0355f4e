// Main entry point that forwards to the fractal-app binary
fn main() -> anyhow::Result<()> {
    fractal_app::main()
}

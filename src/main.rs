fn main() -> anyhow::Result<()> {
    scrollguard_lib::run()
}

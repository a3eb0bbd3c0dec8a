use anyhow::Result;

fn main() -> Result<()> {
    manulmanor::app::run()
}

fn main() -> shadow_rs::SdResult<()> {
    // Exposes version and commit constants to `shadow!(build)` in the binary.
    shadow_rs::ShadowBuilder::builder().build()?;
    Ok(())
}

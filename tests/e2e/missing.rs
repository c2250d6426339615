//! Tests for behavior around missing files.

use super::*;

#[test]
fn missing_input() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("present", "")?;
    let out = space.run(&mut buildtrace_command(vec!["present", "absent"]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "buildtrace: error:");
    assert_output_contains(&out, "absent");
    assert_output_contains(&out, "not found");
    Ok(())
}

#[test]
fn missing_output_is_stale() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("in", "")?;
    let out = space.run(&mut buildtrace_command(vec!["-o", "out", "in"]))?;
    assert_eq!(out.status.code(), Some(2));
    assert_output_contains(&out, "out is stale");
    Ok(())
}

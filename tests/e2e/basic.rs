use crate::e2e::*;

#[test]
fn no_inputs() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let out = space.run(&mut buildtrace_command(vec![]))?;
    assert_eq!(out.status.code(), Some(1));
    assert_output_contains(&out, "no input paths given");
    Ok(())
}

#[test]
fn newest_input() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write_at("a.txt", "a", 100)?;
    space.write_at("b.txt", "b", 200)?;
    let out = space.run_expect(&mut buildtrace_command(vec!["a.txt", "b.txt"]))?;
    assert_output_contains(&out, "2 inputs, newest 200.000000000");
    Ok(())
}

#[test]
fn hash_depends_on_order() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("a.txt", "a")?;
    space.write("b.txt", "b")?;
    let ab = space.run_expect(&mut buildtrace_command(vec!["--hash", "a.txt", "b.txt"]))?;
    let ba = space.run_expect(&mut buildtrace_command(vec!["--hash", "b.txt", "a.txt"]))?;
    assert_output_contains(&ab, "hash ");
    assert_ne!(ab.stdout, ba.stdout);
    Ok(())
}

#[test]
fn output_staleness() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write_at("in", "", 200)?;

    space.write_at("out", "", 300)?;
    let out = space.run_expect(&mut buildtrace_command(vec!["-o", "out", "in"]))?;
    assert_output_contains(&out, "out is up to date");

    space.write_at("out", "", 100)?;
    let out = space.run(&mut buildtrace_command(vec!["-o", "out", "in"]))?;
    assert_eq!(out.status.code(), Some(2));
    assert_output_contains(&out, "out is stale");

    Ok(())
}

#[test]
fn debug_trace() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("in", "")?;
    space.run_expect(&mut buildtrace_command(vec!["-d", "trace", "--hash", "in"]))?;
    let trace = std::fs::read_to_string(space.path().join("trace.json"))?;
    assert!(trace.starts_with("[\n"));
    assert!(trace.contains("\"name\": \"stat\""));
    assert!(trace.trim_end().ends_with(']'));
    Ok(())
}

use anyhow::anyhow;
use argh::FromArgs;
use buildtrace::file_target::{FileTarget, FilesTarget};
use buildtrace::fs::{FileSystem, RealFileSystem, StatCache, StatError};
use buildtrace::hash_target::HashTarget;
use buildtrace::perf;
use std::path::{Path, PathBuf};

#[cfg(not(any(windows, target_arch = "wasm32")))]
use jemallocator::Jemalloc;

#[cfg(not(any(windows, target_arch = "wasm32")))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

/// Report the staleness trace of a set of files.
#[derive(FromArgs)]
struct Args {
    /// chdir before running
    #[argh(option, short = 'C')]
    dir: Option<String>,

    /// debugging tools (use "list" to list)
    #[argh(option, short = 'd')]
    debug: Option<String>,

    /// also hash file contents
    #[argh(switch)]
    hash: bool,

    /// output file to check against the inputs
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// input paths
    #[argh(positional)]
    paths: Vec<PathBuf>,
}

fn run_impl(args: Args) -> anyhow::Result<i32> {
    if let Some(debug) = &args.debug {
        match debug.as_str() {
            "list" => {
                println!("debug tools:");
                println!("  trace  generate json performance trace");
                return Ok(1);
            }
            "trace" => perf::open("trace.json")?,
            _ => anyhow::bail!("unknown -d {:?}, use -d list to list", debug),
        }
    }

    if let Some(dir) = &args.dir {
        let dir = Path::new(dir);
        std::env::set_current_dir(dir).map_err(|err| anyhow!("chdir {:?}: {}", dir, err))?;
    }

    if args.paths.is_empty() {
        anyhow::bail!("no input paths given");
    }

    let fs = StatCache::new(RealFileSystem::new());

    // Build one leaf per input and join them, so the report is computed
    // the same way a recipe would see it.
    let leaves = args
        .paths
        .iter()
        .map(|path| FileTarget::compute(&fs, path))
        .collect::<Result<Vec<_>, StatError>>()?;
    let inputs = FilesTarget::from_targets(leaves).materialize()?;
    println!("buildtrace: {} inputs, newest {}", inputs.artifact.len(), inputs.trace);

    if args.hash {
        let leaves = args
            .paths
            .iter()
            .map(|path| HashTarget::<PathBuf>::compute_file(&fs, path))
            .collect::<Result<Vec<_>, StatError>>()?;
        let all = HashTarget::all(&leaves);
        all.materialize()?;
        println!("buildtrace: hash {}", all.trace.hash);
    }

    if let Some(output) = &args.output {
        let up_to_date = match fs.stat(output) {
            Ok(mtime) => mtime.is_up_to_date(&inputs.trace),
            Err(StatError::NotFound { .. }) => false,
            Err(err) => return Err(err.into()),
        };
        if up_to_date {
            println!("buildtrace: {} is up to date", output.display());
        } else {
            println!("buildtrace: {} is stale", output.display());
            return Ok(2);
        }
    }

    Ok(0)
}

fn run() -> anyhow::Result<i32> {
    let args: Args = argh::from_env();
    let res = run_impl(args);
    perf::close()?;
    res
}

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            println!("buildtrace: error: {}", err);
            1
        }
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

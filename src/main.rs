/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use hancho::{run, CliConfig};

fn print_usage() {
    eprintln!(
        r#"usage: hancho [-C root_dir] [-f root_file] [-j N] [-v] [-q] [-n] [-d]
               [--force] [--trace] [-s|--shuffle] [--use_color]
               [--key=value ...] [target-regex]

if target-regex is unspecified, every task in the entry script is built.

options:
  --version  print hancho's version ("{}")

  -C DIR   change to DIR before doing anything else
  -f FILE  specify the entry script [default=build.hancho]
  -j N     run N jobs in parallel [0 = unbounded, default=number of CPUs]
  -v       verbose: print each task's rebuild reason
  -q       quiet: suppress per-task status lines
  -n       dry run: make rebuild decisions but skip running commands
  -d       dump per-callsite timing stats when the run finishes
  --force  rebuild every task regardless of mtimes
  --trace  print every template expansion step to stderr
  -s, --shuffle  dispatch newly-queued tasks in random order
  --use_color    force-enable colored status output
"#,
        env!("CARGO_PKG_VERSION"),
    );
}

fn main() -> anyhow::Result<()> {
    let mut args = pico_args::Arguments::from_env();

    if args.contains(["-h", "--help"]) {
        print_usage();
        std::process::exit(1);
    }
    if args.contains("--version") {
        println!("{}", env!("CARGO_PKG_VERSION"));
        std::process::exit(0);
    }

    let mut config = CliConfig::default();
    config.execution_dir = args.opt_value_from_str("-C")?;
    if let Some(root_file) = args.opt_value_from_str::<_, String>("-f")? {
        config.root_file = root_file;
    }
    config.job_slots = args.opt_value_from_str("-j")?;
    config.verbose = args.contains("-v");
    config.quiet = args.contains("-q");
    config.dry_run = args.contains("-n");
    config.debug = args.contains("-d");
    config.force = args.contains("--force");
    config.trace = args.contains("--trace");
    config.shuffle = args.contains(["-s", "--shuffle"]);
    if args.contains("--use_color") {
        config.use_color = true;
    }

    let free_args = args.finish();
    let mut overrides = Vec::new();
    let mut targets = Vec::new();
    for arg in free_args {
        let arg = arg.to_string_lossy().into_owned();
        match arg.strip_prefix("--") {
            Some(rest) if rest.contains('=') => {
                let mut parts = rest.splitn(2, '=');
                let key = parts.next().unwrap().to_string();
                let value = parts.next().unwrap_or_default().to_string();
                overrides.push((key, value));
            }
            _ => targets.push(arg),
        }
    }
    config.overrides = overrides;
    config.target = targets.into_iter().next();

    let exit_code = run(config)?;
    std::process::exit(exit_code);
}

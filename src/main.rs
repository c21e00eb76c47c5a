use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use bootvm::address::VM_SIZE;
use bootvm::assembler::strip_comments;
use bootvm::cell::{Cell, Register};
use bootvm::console::{stdout_sink, write_stack};
use bootvm::token::Position;
use bootvm::{bootstrap, BootError};

#[derive(Parser)]
#[command(name = "bootvm")]
#[command(about = "Assembler and runner for a self-bootstrapping virtual machine", long_about = None)]
#[command(version)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Assemble a source file into a memory image
  Assemble {
    /// Source file. Reads standard input when absent.
    source: Option<PathBuf>,
    /// Image to write. Defaults to the source with a `.b64` extension, or `a.b64`.
    #[arg(short, long)]
    output: Option<PathBuf>,
  },

  /// Load a memory image and run it until it halts
  Run {
    /// Image file
    image: PathBuf,
    /// Print the machine state before every step
    #[arg(long)]
    trace: bool,
  },
}

fn assemble(source: Option<PathBuf>, output: Option<PathBuf>) -> Result<PathBuf, BootError> {
  let (text, default_output) = match source {

    Some(path) => {
      let text = fs::read_to_string(&path)?;
      (text, path.with_extension("b64"))
    }

    None => {
      let mut text = String::new();
      io::stdin().read_to_string(&mut text)?;
      (text, PathBuf::from("a.b64"))
    }

  };
  let output = output.unwrap_or(default_output);

  let (mut machine, mut assembler) = bootstrap(stdout_sink())?;
  if let Err(error) = assembler.assemble(&mut machine, &strip_comments(&text)) {
    eprintln!("{}", excerpt(&text, error.position()));
    return Err(error.into());
  }

  machine.set_reg(Register::IP, 0);
  machine.set_reg(Register::SP, (VM_SIZE - 1) as Cell);
  machine.save(&output)?;
  Ok(output)
}

/// The source line at `position` with a caret under its column.
fn excerpt(text: &str, position: Position) -> String {
  let line = text.lines().nth(position.line.saturating_sub(1)).unwrap_or("");
  format!(
    "{:>5} | {}\n      | {}^",
    position.line,
    line,
    " ".repeat(position.column.saturating_sub(1))
  )
}

fn run(image: PathBuf, trace: bool) -> Result<(), BootError> {
  let (mut machine, _) = bootstrap(stdout_sink())?;
  machine.load(&image)?;

  match trace {
    true  => machine.run_trace()?,
    false => machine.run()?
  }

  println!();
  println!("{}", machine.dump_registers());
  write_stack(&machine, &mut io::stdout())?;
  Ok(())
}

fn main() {
  #[cfg(feature = "trace_computation")]
  println!("Computation Tracing ENABLED");

  let cli = Cli::parse();

  match cli.command {

    Commands::Assemble { source, output } => {
      match assemble(source, output) {
        Ok(path) => println!("Wrote {}", path.display()),
        Err(e) => {
          eprintln!("{}", e);
          eprintln!("Assembly aborted.");
          process::exit(1);
        }
      }
    }

    Commands::Run { image, trace } => {
      if let Err(e) = run(image, trace) {
        eprintln!("{}", e);
        process::exit(1);
      }
    }

  }
}

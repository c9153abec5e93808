//! Command-line front-end for the CRC-32 code generator.
//!
//! Flags may be spelled `--opt value` or `--opt=value`. All validation
//! failures print a one-line `FATAL error at ...` diagnostic and exit
//! with status 1.

use std::env;
use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::process::ExitCode;

use codegen::{algo, generate, poly, Isa};

const OPTIONS: [&[&str]; 4] = [
  &["--isa", "-i"],
  &["--poly", "-p", "--polynomial"],
  &["--algo", "-a", "--algorithm"],
  &["--out", "-o", "--output"],
];
const ISA_SLOT: usize = 0;
const POLY_SLOT: usize = 1;
const ALGO_SLOT: usize = 2;
const OUT_SLOT: usize = 3;

fn print_help(self_name: &str) {
  #[cfg(target_arch = "aarch64")]
  let host_isa = Isa::Neon.as_str();
  #[cfg(not(target_arch = "aarch64"))]
  let host_isa = Isa::Sse.as_str();
  println!("Usage: {self_name} [OPTION]...");
  println!("Generate C code for computing CRC32.");
  println!("Example: {self_name} -i {host_isa} -p crc32c -a v8s1_s2");
  println!();
  println!("Options controlling code generation:");
  println!("  -i, --isa=ISA");
  println!("  -p, --polynomial=POLY");
  println!("  -a, --algorithm=ALGO");
  println!();
  println!("Output control:");
  println!("  -o, --output=FILE");
  println!();
  println!("Possible values for ISA are:");
  println!("  neon (aarch64, tuned for pmull+eor fusion)");
  println!("  neon_eor3 (aarch64, using pmull and eor3)");
  println!("  sse, avx, avx2 (x86_64, using pclmulqdq)");
  println!("  avx512 (x86_64, using pclmulqdq and vpternlogq)");
  println!("  avx512_vpclmulqdq (x86_64, using vpclmulqdq and vpternlogq)");
  println!();
  println!("Possible values for POLY include:");
  println!("  crc32   (0x04C11DB7) - hardware accelerated on aarch64");
  println!("  crc32c  (0x1EDC6F41) - hardware accelerated on aarch64 and x86_64");
  println!("  crc32k  (0x741B8CD7)");
  println!("  crc32k2 (0x32583499)");
  println!("  crc32q  (0x814141AB)");
  println!("  or specify any 32-bit polynomial in hexadecimal form");
  println!();
  println!("The ALGO string consists of multiple phases, separated by underscores.");
  println!("Each phase can contain (with no spaces inbetween) any mixture of:");
  println!("  vN[xM] use N vector accumulators, and NxM vector loads per iteration");
  println!("  sN[xM] use N scalar accumulators, and NxM scalar loads per iteration");
  println!("  kN     use an outer loop over N bytes");
  println!("  e      use an end pointer for the (inner) loop condition");
  println!();
  println!("See https://github.com/corsix/fast-crc32/");
}

fn run() -> Result<(), String> {
  let args: Vec<String> = env::args().collect();
  let self_name = args.first().map_or("generate", String::as_str);

  let mut values: [Option<String>; 4] = [None, None, None, None];
  let mut i = 1;
  while i < args.len() {
    let arg = &args[i];
    if arg == "--help" || arg == "-h" || arg == "-?" {
      print_help(self_name);
      return Ok(());
    }
    let (name, inline) = match arg.split_once('=') {
      Some((name, value)) => (name, Some(value)),
      None => (arg.as_str(), None),
    };
    let Some(slot) = OPTIONS.iter().position(|spellings| spellings.contains(&name)) else {
      return Err(format!("unknown option {name}"));
    };
    let value = match inline {
      Some(value) => value.to_owned(),
      None => {
        i += 1;
        match args.get(i) {
          Some(value) => value.clone(),
          None => return Err(format!("missing value for option {name}")),
        }
      }
    };
    values[slot] = Some(value);
    i += 1;
  }

  let isa = match values[ISA_SLOT].as_deref() {
    Some(value) if !value.is_empty() => Isa::parse(value).map_err(|e| e.to_string())?,
    _ => Isa::None,
  };
  let polynomial = match values[POLY_SLOT].as_deref() {
    Some(value) if !value.is_empty() => poly::parse(value).map_err(|e| e.to_string())?,
    _ => poly::CRC32,
  };
  let phases = match values[ALGO_SLOT].as_deref() {
    Some(value) if !value.is_empty() => algo::parse(value, isa).map_err(|e| e.to_string())?,
    _ => Vec::new(),
  };

  let mut banner = String::from("/* Generated by crc32-codegen using: */\n/* ");
  banner.push_str(self_name);
  for (slot, short) in [(ISA_SLOT, "-i"), (POLY_SLOT, "-p"), (ALGO_SLOT, "-a")] {
    if let Some(value) = &values[slot] {
      let _ = write!(banner, " {short} {value}");
    }
  }
  banner.push_str(" */\n/* MIT licensed */\n\n");

  let source = generate(isa, polynomial, &phases, &banner);

  match values[OUT_SLOT].as_deref() {
    None | Some("") | Some("-") => io::stdout()
      .write_all(source.as_bytes())
      .map_err(|e| format!("could not write to stdout ({e})")),
    Some(path) => {
      std::fs::write(path, &source).map_err(|_| format!("could not open {path} for writing"))
    }
  }
}

fn main() -> ExitCode {
  match run() {
    Ok(()) => ExitCode::SUCCESS,
    Err(message) => {
      eprintln!("FATAL error at {message}");
      ExitCode::FAILURE
    }
  }
}

//! Fuzz target for the brace-aware indent writer.
//!
//! Inputs are assembled from tokens with bounded brace depth, the contract
//! emitters uphold. Tests that:
//! - No panics
//! - Output is identical however the input is chunked
//! - Stripping indentation recovers the input text

#![no_main]

use arbitrary::Arbitrary;
use emit::IndentWriter;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug, Clone, Copy)]
enum Token {
  Open,
  Close,
  Newline,
  Statement,
  InlineBraces,
}

#[derive(Arbitrary, Debug)]
struct Input {
  tokens: Vec<Token>,
  split_point: usize,
}

fn assemble(tokens: &[Token]) -> String {
  let mut text = String::new();
  let mut depth = 0u32;
  for token in tokens {
    match token {
      Token::Open if depth < 12 => {
        text.push_str("{\n");
        depth += 1;
      }
      Token::Close if depth > 0 => {
        text.push_str("}\n");
        depth -= 1;
      }
      Token::Open | Token::Close => {}
      Token::Newline => text.push('\n'),
      Token::Statement => text.push_str("x = f(y);\n"),
      Token::InlineBraces => text.push_str("int t[] = {1, 2};\n"),
    }
  }
  for _ in 0..depth {
    text.push_str("}\n");
  }
  text
}

fn indent_all(text: &str, split: usize) -> String {
  let mut out = String::new();
  let mut writer = IndentWriter::new(&mut out);
  let split = split % (text.len() + 1);
  let (a, b) = text.split_at(split);
  writer.write(a).unwrap();
  writer.write(b).unwrap();
  writer.finish().unwrap();
  out
}

fuzz_target!(|input: Input| {
  let text = assemble(&input.tokens);
  let chunked = indent_all(&text, input.split_point);
  let whole = indent_all(&text, 0);
  assert_eq!(chunked, whole, "chunking must not change output");

  // Removing leading spaces from each line recovers the unindented text.
  let mut stripped = String::new();
  for line in whole.split_inclusive('\n') {
    stripped.push_str(line.trim_start_matches(' '));
  }
  assert_eq!(stripped, text, "indentation must only add leading spaces");
});

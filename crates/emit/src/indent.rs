//! Brace-aware re-indentation of streamed C source text.

use core::fmt;

/// Two spaces per level, up to the maximum nesting depth.
const INDENT: &str = "                                ";
const CLOSERS: &str = "}}}}}}}}}}}}}}}}";

/// Maximum brace nesting depth the writer supports.
pub const MAX_DEPTH: u32 = 16;

/// Streaming writer that applies indentation to brace-delimited blocks.
///
/// Emitters write all text flush-left; this writer inserts two spaces per
/// open block at the start of each line. A `{` opens an indented block only
/// when it is the last character before a newline, so brace expressions
/// like `{0, 1}` pass through untouched. A run of `}` at the start of a
/// line is printed together on that line, at the depth of the outermost one.
///
/// The writer keeps one bit of state per open brace (whether it indented),
/// so nesting is bounded by [`MAX_DEPTH`]. Exceeding the bound is a caller
/// bug and panics.
pub struct IndentWriter<'w, W: fmt::Write> {
  out: &'w mut W,
  /// Bit per open brace: set if that brace increased the indent level.
  stack: u16,
  level: u8,
  /// 0: nothing pending. 1: previous character was `{`. 2: previous
  /// character was `\n`. 2 + n: n closing braces held back since a `\n`.
  state: u8,
}

impl<'w, W: fmt::Write> IndentWriter<'w, W> {
  pub fn new(out: &'w mut W) -> Self {
    Self {
      out,
      stack: 0,
      level: 0,
      state: 0,
    }
  }

  /// Stream a chunk of text, applying pending indentation.
  ///
  /// Chunks may split anywhere; state carries across calls.
  pub fn write(&mut self, text: &str) -> fmt::Result {
    let bytes = text.as_bytes();
    let mut base = 0;
    let mut i = 0;
    while i < bytes.len() {
      let c = bytes[i];
      i += 1;
      if self.state >= 2 {
        if c == b'}' {
          // Un-indent if the matching `{` caused an indent, and hold the
          // `}` back so a following `}` can share the line.
          self.level -= (self.stack & 1) as u8;
          self.stack >>= 1;
          self.state += 1;
          assert!(self.state - 2 <= MAX_DEPTH as u8, "brace nesting too deep");
          if i - base > 1 {
            self.out.write_str(&text[base..i - 1])?;
          }
          base = i;
          continue;
        }
        if c != b'\n' || self.state > 2 {
          // Commit the pending line start: everything before `c`, then the
          // indent, then any held-back closing braces.
          if i - base > 1 {
            self.out.write_str(&text[base..i - 1])?;
          }
          base = i - 1;
          self.out.write_str(&INDENT[..usize::from(self.level) * 2])?;
          self.out.write_str(&CLOSERS[..usize::from(self.state - 2)])?;
        }
        self.state = 0;
      }
      match c {
        b'{' => {
          assert!(self.stack & 0x8000 == 0, "brace nesting too deep");
          self.stack <<= 1;
          self.state = 1;
        }
        b'\n' => {
          // A `{` directly before the newline opens an indented block.
          self.stack |= u16::from(self.state);
          self.level += self.state;
          assert!(u32::from(self.level) <= MAX_DEPTH, "brace nesting too deep");
          self.state = 2;
        }
        b'}' => {
          self.level -= (self.stack & 1) as u8;
          self.stack >>= 1;
          self.state = 0;
        }
        _ => self.state = 0,
      }
    }
    if i != base {
      self.out.write_str(&text[base..i])?;
    }
    Ok(())
  }

  /// Flush any closing braces still held back.
  ///
  /// Only needed when the stream does not end with a newline.
  pub fn finish(self) -> fmt::Result {
    if self.state > 2 {
      self.out.write_str(&INDENT[..usize::from(self.level) * 2])?;
      self.out.write_str(&CLOSERS[..usize::from(self.state - 2)])?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  extern crate std;

  use alloc::string::String;

  use super::*;

  fn indent(text: &str) -> String {
    let mut out = String::new();
    let mut w = IndentWriter::new(&mut out);
    w.write(text).unwrap();
    w.finish().unwrap();
    out
  }

  #[test]
  fn empty_block_unchanged() {
    assert_eq!(indent("{\n}\n"), "{\n}\n");
  }

  #[test]
  fn body_indented() {
    assert_eq!(indent("{\nfoo;\n}\n"), "{\n  foo;\n}\n");
  }

  #[test]
  fn nested_blocks() {
    assert_eq!(
      indent("{\na;\n{\nb;\n}\nc;\n}\n"),
      "{\n  a;\n  {\n    b;\n  }\n  c;\n}\n"
    );
  }

  #[test]
  fn brace_expression_not_indented() {
    assert_eq!(indent("int x[] = {1,2,3};\n"), "int x[] = {1,2,3};\n");
  }

  #[test]
  fn brace_expression_inside_block() {
    assert_eq!(
      indent("{\nint x[] = {1,2,3};\n}\n"),
      "{\n  int x[] = {1,2,3};\n}\n"
    );
  }

  #[test]
  fn closing_braces_share_line() {
    assert_eq!(indent("{\n{\nfoo;\n}}\n"), "{\n  {\n    foo;\n}}\n");
  }

  #[test]
  fn text_after_closing_run() {
    // Held-back braces are printed before the next statement.
    assert_eq!(indent("{\n{\na;\n}}b;\n"), "{\n  {\n    a;\n}}b;\n");
  }

  #[test]
  fn split_chunks_match_single_write() {
    let text = "{\nfoo;\n{\nbar;\n}\n}\n";
    let whole = indent(text);
    for split in 1..text.len() {
      let mut out = String::new();
      let mut w = IndentWriter::new(&mut out);
      w.write(&text[..split]).unwrap();
      w.write(&text[split..]).unwrap();
      w.finish().unwrap();
      assert_eq!(out, whole, "split at {}", split);
    }
  }

  #[test]
  fn open_brace_mid_line_does_not_indent() {
    // `{` not at end of line: the block does not indent, and its `}` does
    // not un-indent.
    assert_eq!(
      indent("{\nif (a) { b; }\nc;\n}\n"),
      "{\n  if (a) { b; }\n  c;\n}\n"
    );
  }

  #[test]
  #[should_panic(expected = "nesting too deep")]
  fn depth_overflow_panics() {
    let mut out = String::new();
    let mut w = IndentWriter::new(&mut out);
    for _ in 0..17 {
      w.write("{\n").unwrap();
    }
  }
}

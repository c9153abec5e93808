//! The loop synthesiser: assembles the exported `crc32_impl` from the
//! parsed algorithm phases.
//!
//! Each phase becomes an alignment preamble, a vector pre-load, a parallel
//! fold main loop with interleaved scalar chains, an accumulator reduction
//! tree, and an optional scalar tail. Mixed phases must reconcile that
//! vectors do one iteration *before* the loop (to pre-load accumulators)
//! while scalars do not; when the scalar chains end last in memory order, a
//! scalar tail absorbs the final chunk into the merged vector CRC.

use emit::NodeId;

use super::{put, Addend, ClmulHalf, Generator, Header};
use crate::algo::AlgoPhase;
use crate::gf2;
use crate::isa::Isa;

impl Generator {
  /// Emit `s_load / s_acc` scalar CRC applications per accumulator, each
  /// chain `j` addressing `buf + klen * j`.
  fn push_scalar_chains(&mut self, b: NodeId, ap: &AlgoPhase) {
    let sb = self.cfg.scalar_bytes;
    let mut i = 0;
    while i < ap.s_load {
      for j in 0..ap.s_acc {
        self.push_scalar_update_open(b, j, sb);
        if i != 0 || j != 0 {
          self.tree.push_str(b, "(");
        }
        self.tree.push_str(b, "buf");
        if j != 0 {
          self.tree.push_str(b, " + ");
          self.push_product(b, "klen", j);
        }
        if i != 0 {
          put!(self, b, " + {}", (i / ap.s_acc) * sb);
        }
        if i != 0 || j != 0 {
          self.tree.push_str(b, ")");
        }
        self.tree.push_str(b, ");\n");
      }
      i += ap.s_acc;
    }
  }

  /// Emit the whole exported function.
  pub(crate) fn emit_crc_fn(&mut self, phases: &[AlgoPhase]) {
    let b = self.tree.node();
    self.tree.push_str(
      b,
      "CRC_EXPORT uint32_t crc32_impl(uint32_t crc0, const char* buf, size_t len) {\n\
       crc0 = ~crc0;\n",
    );
    let mut alignment = self.cfg.scalar_bytes;
    if alignment > 1 {
      self.require_scalar_crc(1);
      let s1 = self.cfg.scalar1_fn;
      put!(self, b, "for (; len && ((uintptr_t)buf & {}); --len) {{\n", alignment - 1);
      put!(self, b, "crc0 = {s1}(crc0, *buf++);\n");
      self.tree.push_str(b, "}\n");
    }
    for ap in phases {
      self.emit_phase(b, ap, &mut alignment);
    }
    let sb = self.cfg.scalar_bytes;
    put!(self, b, "for (; len >= {sb}; buf += {sb}, len -= {sb}) {{\n");
    self.push_scalar_update_open(b, 0, sb);
    self.tree.push_str(b, "buf);\n}\n");
    if sb > 1 {
      self.require_scalar_crc(1);
      let s1 = self.cfg.scalar1_fn;
      self.tree.push_str(b, "for (; len; --len) {\n");
      put!(self, b, "crc0 = {s1}(crc0, *buf++);\n");
      self.tree.push_str(b, "}\n");
    }
    self.tree.push_str(b, "return ~crc0;\n}\n");
    let out = self.out;
    self.tree.attach(out, b);
  }

  fn emit_phase(&mut self, b: NodeId, ap: &AlgoPhase, alignment: &mut u32) {
    let vb = self.cfg.vector_bytes;
    let sb = self.cfg.scalar_bytes;

    if ap.v_acc != 0 && vb > *alignment {
      // Walk the buffer up to vector alignment with scalar steps.
      *alignment = vb;
      let kw = if vb == sb * 2 { "if" } else { "while" };
      put!(self, b, "{kw} (((uintptr_t)buf & {}) && len >= {sb}) {{\n", vb - sb);
      self.push_scalar_update_open(b, 0, sb);
      self.tree.push_str(b, "buf);\n");
      put!(self, b, "buf += {sb};\n");
      put!(self, b, "len -= {sb};\n");
      self.tree.push_str(b, "}\n");
    }
    if ap.v_load == 0 && ap.s_load <= 1 {
      return;
    }

    // Bytes consumed per iteration, and the fixed iteration count when a
    // kernel size was requested (rounded down to keep alignment).
    let block_size = ap.v_load * vb + ap.s_load * sb;
    let kernel_align = if ap.v_load != 0 { vb } else { sb };
    let kernel_ideal = ap.kernel_size / kernel_align * kernel_align;
    let mut kernel_itrs = kernel_ideal / block_size;

    // Bytes consumed after the loop by accumulator merging. Scalars need a
    // tail either to merge multiple chains, or because they end last in
    // memory order (their loads do not preserve vector alignment).
    let mut scalar_tail = 0u32;
    if ap.v_load == 0 {
      if ap.s_acc > 1 {
        scalar_tail = sb;
      }
    } else if ap.s_load != 0 {
      let scalar_bytes_total = if kernel_itrs != 0 {
        kernel_itrs * ap.s_load * sb
      } else {
        ap.s_load * sb
      };
      if scalar_bytes_total % vb != 0 {
        scalar_tail = sb;
      }
    }
    if kernel_itrs != 0 && scalar_tail != 0 {
      kernel_itrs = (kernel_ideal - scalar_tail) / block_size;
      if kernel_itrs != 0 {
        // Grow the tail so the whole kernel keeps its alignment.
        let excess = (block_size * kernel_itrs + scalar_tail) % kernel_align;
        if excess != 0 {
          scalar_tail += kernel_align - excess;
        }
      }
    }

    let v_present = u32::from(ap.v_acc != 0);
    let stride = if ap.s_acc != 0 { ap.s_load / ap.s_acc * sb } else { 0 };

    if kernel_itrs != 0 {
      put!(self, b, "while (len >= {}) {{\n", block_size * kernel_itrs + scalar_tail);
      if !ap.use_end_ptr && kernel_itrs != v_present {
        put!(self, b, "uint32_t kitrs = {};\n", kernel_itrs - v_present);
      }
    } else {
      put!(self, b, "if (len >= {}) {{\n", block_size + scalar_tail);
    }
    let vars = self.tree.attach_new(b);
    if kernel_itrs == 0 && ap.use_end_ptr {
      self.tree.push_str(vars, "const char* end = buf + len;\n");
    }

    // Base pointer for vector loads; `buf2` when scalars share the block.
    let mut vbuf = "buf";
    if ap.v_load == 0 && ap.s_acc > 1 {
      if kernel_itrs != 0 {
        put!(self, vars, "const size_t klen = {};\n", kernel_itrs * stride);
      } else {
        put!(
          self,
          vars,
          "size_t klen = ((len - {scalar_tail}) / {block_size}) * {stride};\n"
        );
      }
      if ap.use_end_ptr {
        put!(self, vars, "const char* limit = buf + klen - {stride};\n");
      }
    } else if ap.v_load != 0 && ap.s_acc != 0 {
      vbuf = "buf2";
      if kernel_itrs != 0 {
        put!(self, vars, "const size_t blk = {kernel_itrs};\n");
        if ap.s_acc > 1 || scalar_tail == 0 || ap.use_end_ptr {
          put!(self, vars, "const size_t klen = blk * {stride};\n");
        }
      } else {
        put!(self, vars, "size_t blk = (len - {scalar_tail}) / {block_size};\n");
        put!(self, vars, "size_t klen = blk * {stride};\n");
      }
      put!(self, vars, "const char* {vbuf} = buf + ");
      self.push_product(vars, "klen", if scalar_tail != 0 { 0 } else { ap.s_acc });
      self.tree.push_str(vars, ";\n");
      if ap.use_end_ptr {
        if scalar_tail != 0 {
          put!(
            self,
            vars,
            "const char* limit = buf + blk * {} + klen - {};\n",
            ap.v_load * vb,
            stride * 2
          );
        } else {
          put!(self, vars, "const char* limit = buf + klen - {};\n", stride * 2);
        }
      }
    } else if ap.use_end_ptr {
      if kernel_itrs != 0 {
        put!(self, vars, "const char* limit = buf + {};\n", (kernel_itrs - 1) * block_size);
      } else {
        put!(self, vars, "const char* limit = buf + len - {block_size};\n");
      }
    }
    for i in 1..ap.s_acc {
      put!(self, vars, "uint32_t crc{i} = 0;\n");
    }

    // Vectors do one iteration pre-loop to initialise the accumulators.
    if ap.v_acc != 0 {
      self.tree.push_str(b, "/* First vector chunk. */\n");
      let vt = self.cfg.vector_type;
      for i in 0..ap.v_acc {
        put!(self, b, "{vt} x{i} = ");
        self.push_vector_load(b, vbuf, i * vb);
        put!(self, b, ", y{i};\n");
      }
      put!(self, b, "{vt} k;\n");
      self.push_fold_constant(b, ap.v_acc);
      if ap.s_load == 0 || scalar_tail != 0 {
        self.push_crc_into_vector(b, "crc0", "x0");
        if scalar_tail != 0 {
          self.tree.push_str(b, "crc0 = 0;\n");
        }
      }
      let mut i = ap.v_acc;
      while i < ap.v_load {
        let muls = self.tree.attach_new(b);
        for j in 0..ap.v_acc {
          self.push_fold_step(muls, b, j, Addend::Load { base: vbuf, offset: (i + j) * vb });
        }
        i += ap.v_acc;
      }
      put!(self, b, "{vbuf} += {};\n", ap.v_load * vb);
      if kernel_itrs == 0 && !ap.use_end_ptr {
        put!(self, b, "len -= {block_size};\n");
      }
      if scalar_tail != 0 {
        put!(self, b, "buf += blk * {};\n", ap.v_load * vb);
      }
    }

    if kernel_itrs == 0 || kernel_itrs != v_present {
      // The loop condition lands either before the body (`while`) or after
      // it (`do .. while`), so it is built in a detached node.
      let cond = self.tree.node();
      let mut cond_suffix = true;
      self.tree.push_str(b, "/* Main loop. */\n");
      if kernel_itrs != 0 {
        if ap.use_end_ptr {
          self.tree.push_str(cond, "while (buf <= limit)");
        } else {
          self.tree.push_str(cond, "while (--kitrs)");
        }
      } else {
        if ap.use_end_ptr {
          self.tree.push_str(cond, "while (buf <= limit)");
        } else {
          put!(self, cond, "while (len >= {})", block_size + scalar_tail);
        }
        if ap.v_load != 0 {
          self.tree.attach(b, cond);
          cond_suffix = false;
          self.tree.push_str(b, " {\n");
        }
      }
      if cond_suffix {
        self.tree.push_str(b, "do {\n");
      }
      let mut i = 0;
      while i < ap.v_load {
        let muls = self.tree.attach_new(b);
        for j in 0..ap.v_acc {
          self.push_fold_step(muls, b, j, Addend::Load { base: vbuf, offset: (i + j) * vb });
        }
        i += ap.v_acc;
      }
      self.push_scalar_chains(b, ap);
      if ap.s_load != 0 {
        put!(self, b, "buf += {stride};\n");
      }
      if ap.v_load != 0 {
        put!(self, b, "{vbuf} += {};\n", ap.v_load * vb);
      }
      if kernel_itrs == 0 && !ap.use_end_ptr {
        put!(self, b, "len -= {block_size};\n");
      }
      self.tree.push_str(b, "}");
      if cond_suffix {
        self.tree.push_str(b, " ");
        self.tree.attach(b, cond);
        self.tree.push_str(b, ";");
      }
      self.tree.push_str(b, "\n");
    }

    // The loop is over; merge the accumulators.
    if ap.v_acc > 1 {
      put!(self, b, "/* Reduce x0 ... x{} to just x0. */\n", ap.v_acc - 1);
      self.push_reduce_tree(b, ap.v_acc);
    }
    if ap.s_acc > 1 || (ap.v_load != 0 && ap.s_acc != 0) {
      if ap.v_load != 0 {
        // Vectors did one iteration pre-loop, so scalars owe one post-loop.
        self.tree.push_str(b, "/* Final scalar chunk. */\n");
        self.push_scalar_chains(b, ap);
        if scalar_tail != 0 {
          put!(self, b, "buf += {stride};\n");
        }
      }
      // Shift each scalar accumulator by the bytes that follow it. The
      // last one has nothing after it when the tail covers it.
      for i in 0..ap.s_acc {
        if i + 1 >= ap.s_acc && scalar_tail != 0 {
          break;
        }
        let v16 = self.cfg.vec16_type;
        put!(self, vars, "{v16} vc{i};\n");
        put!(
          self,
          b,
          "vc{i} = {}(crc{i}, ",
          if kernel_itrs != 0 { "clmul_scalar" } else { "crc_shift" }
        );
        if kernel_itrs != 0 {
          let amount = kernel_itrs * stride * (ap.s_acc - 1 - i)
            + if scalar_tail != 0 {
              scalar_tail
            } else {
              kernel_itrs * ap.v_load * vb
            };
          let shift = gf2::x_n_mod_p(self.cfg.poly, u64::from(amount) * 8 - 33);
          put!(self, b, "0x{shift:08x}");
          self.require_clmul_scalar();
        } else {
          self.require_crc_shift();
          self.push_product(b, "klen", ap.s_acc - 1 - i);
          if scalar_tail != 0 {
            put!(self, b, " + {scalar_tail}");
          } else if ap.v_load != 0 {
            put!(self, b, " + blk * {}", ap.v_load * vb);
          }
        }
        self.tree.push_str(b, ");\n");
      }
      self.tree.push_str(vars, "uint64_t vc;\n");
      if ap.s_acc == u32::from(scalar_tail != 0) {
        self.tree.push_str(b, "vc = 0;\n");
      } else {
        let lane = self.cfg.vec16_lane8_fn;
        put!(self, b, "vc = {lane}(");
        self.push_xor_tree(b, 0, ap.s_acc - u32::from(scalar_tail != 0));
        self.tree.push_str(b, ", 0);\n");
      }
    }

    if ap.v_load != 0 {
      let mut x0 = "x0";
      if self.cfg.isa == Isa::Avx512Vpclmulqdq {
        self.tree.push_str(b, "/* Reduce 512 bits to 128 bits. */\n");
        self.require_header(Header::Immintrin);
        self.require_clmul(ClmulHalf::Lo, self.cfg.isa);
        self.require_clmul(ClmulHalf::Hi, self.cfg.isa);
        self.tree.push_str(b, "k = _mm512_setr_epi32(");
        let mut n = 415;
        while n >= 95 {
          let c = gf2::x_n_mod_p(self.cfg.poly, n);
          put!(self, b, "0x{c:08x}, 0, ");
          n -= 64;
        }
        self.tree.push_str(b, "0, 0, 0, 0);\n");
        self.tree.push_str(
          b,
          "y0 = clmul_lo(x0, k), k = clmul_hi(x0, k);\n\
           y0 = _mm512_xor_si512(y0, k);\n",
        );
        let v16 = self.cfg.vec16_type;
        put!(self, vars, "{v16} z0;\n");
        self.tree.push_str(
          b,
          "z0 = _mm_ternarylogic_epi64(_mm512_castsi512_si128(y0), _mm512_extracti32x4_epi32(y0, 1), _mm512_extracti32x4_epi32(y0, 2), 0x96);\n\
           z0 = _mm_xor_si128(z0, _mm512_extracti32x4_epi32(x0, 3));\n",
        );
        x0 = "z0";
      }
      self.tree.push_str(b, "/* Reduce 128 bits to 32 bits, and multiply by x^32. */\n");
      let lane = self.cfg.vec16_lane8_fn;
      let wide = self.cfg.scalar8_fn;
      if scalar_tail != 0 {
        put!(
          self,
          b,
          "vc ^= {lane}({}({wide}({wide}(0, {lane}({x0}, 0)), {lane}({x0}, 1)), ",
          if kernel_itrs != 0 { "clmul_scalar" } else { "crc_shift" }
        );
        if kernel_itrs != 0 {
          let amount = kernel_itrs * ap.s_load * sb + scalar_tail;
          let shift = gf2::x_n_mod_p(self.cfg.poly, u64::from(amount) * 8 - 33);
          put!(self, b, "0x{shift:08x}");
          self.require_clmul_scalar();
        } else {
          self.require_crc_shift();
          put!(self, b, "klen * {} + {scalar_tail}", ap.s_acc);
        }
        self.tree.push_str(b, "), 0);\n");
      } else {
        self.require_scalar_crc(8);
        put!(self, b, "crc0 = {wide}(0, {lane}({x0}, 0));\n");
        put!(
          self,
          b,
          "crc0 = {wide}(crc0, {}{lane}({x0}, 1));\n",
          if ap.s_load != 0 { "vc ^ " } else { "" }
        );
      }
    }

    if scalar_tail != 0 {
      put!(self, b, "/* Final {scalar_tail} bytes. */\n");
      if ap.s_acc > 1 {
        self.tree.push_str(b, "buf += ");
        self.push_product(b, "klen", ap.s_acc - 1);
        self.tree.push_str(b, ";\n");
        put!(self, b, "crc0 = crc{};\n", ap.s_acc - 1);
      }
      let mut left = scalar_tail;
      while left > sb {
        self.push_scalar_update_open(b, 0, sb);
        self.tree.push_str(b, "buf), ");
        put!(self, b, "buf += {sb};\n");
        left -= sb;
      }
      self.push_scalar_update_open(b, 0, sb);
      self.tree.push_str(b, "buf ^ vc), ");
      put!(self, b, "buf += {sb};\n");
      if kernel_itrs == 0 && !ap.use_end_ptr {
        put!(self, b, "len -= {scalar_tail};\n");
      }
    } else if ap.v_load != 0 && ap.s_load != 0 {
      put!(self, b, "buf = {vbuf};\n");
    }

    if kernel_itrs != 0 {
      let consumed = kernel_itrs * block_size + scalar_tail;
      put!(self, b, "len -= {consumed};\n");
      if consumed % vb != 0 {
        *alignment = sb;
      }
    } else {
      if ap.use_end_ptr {
        self.tree.push_str(b, "len = end - buf;\n");
      }
      if block_size % vb != 0 || scalar_tail % vb != 0 {
        *alignment = sb;
      }
    }
    self.tree.push_str(b, "}\n");
  }
}

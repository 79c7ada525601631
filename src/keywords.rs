//! Reserved keyword/special-form/argument-label/enum-value names, registered
//! once at subsystem startup (§4.1) and referenced by iname everywhere else
//! so the compiler and VM never compare strings at runtime.

use crate::word_table::{Iname, WordTable};

/// Every reserved name the language surface defines, pre-resolved to an
/// [`Iname`]. Constructed once by [`Keywords::register`] during
/// [`crate::host::systems_startup`].
#[derive(Debug, Clone, Copy)]
pub struct Keywords {
    // Special forms
    pub define: Iname,
    pub kfn: Iname,
    pub kif: Iname,
    pub kloop: Iname,
    pub kstep: Iname, // deprecated alias for `loop` (§9 open question)
    pub fence: Iname,
    pub on_matrix_stack: Iname,
    pub address_of: Iname,
    pub fn_call: Iname,
    pub quote: Iname,
    pub setq: Iname,

    // Built-in operators
    pub plus: Iname,
    pub minus: Iname,
    pub star: Iname,
    pub slash: Iname,
    pub eq: Iname,
    pub lt: Iname,
    pub gt: Iname,
    pub kand: Iname,
    pub kor: Iname,
    pub knot: Iname,
    pub sqrt: Iname,
    pub kmod: Iname,

    // Loop argument labels
    pub from: Iname,
    pub to: Iname,
    pub upto: Iname,
    pub increment: Iname,
    pub steps: Iname,
    pub quantity: Iname,

    // Easing / colour-format enum values
    pub linear: Iname,
    pub quick: Iname,
    pub slow_in: Iname,
    pub slow_in_out: Iname,
    pub rgb: Iname,
    pub hsl: Iname,
    pub lab: Iname,
    pub hsv: Iname,

    // Predefined globals (the compiler preamble, §4.3)
    pub canvas_width: Iname,
    pub canvas_height: Iname,
    pub white: Iname,
    pub black: Iname,
    pub red: Iname,
    pub green: Iname,
    pub blue: Iname,
    pub yellow: Iname,
    pub magenta: Iname,
    pub cyan: Iname,

    // Native function argument labels (§4.3 "Native function call sites").
    // Registered here rather than discovered per-call so a native can
    // compare a call site's label iname against a known constant instead
    // of trusting whichever label happens to sit first in `args`.
    pub seed: Iname,
    pub min: Iname,
    pub max: Iname,
    pub num: Iname,
    pub vec1: Iname,
    pub vec2: Iname,
    pub vector: Iname,
    pub value: Iname,
    pub element: Iname,
    pub n: Iname,
    pub x: Iname,
    pub y: Iname,
    pub z: Iname,
}

impl Keywords {
    /// Registers every reserved name into the KEYWORD range. Idempotent only
    /// in the sense that calling it twice on two different word tables
    /// yields two structurally-identical but table-local `Keywords`.
    pub fn register(words: &mut WordTable) -> Self {
        Self {
            define: words.register_keyword("define"),
            kfn: words.register_keyword("fn"),
            kif: words.register_keyword("if"),
            kloop: words.register_keyword("loop"),
            kstep: words.register_keyword("step"),
            fence: words.register_keyword("fence"),
            on_matrix_stack: words.register_keyword("on-matrix-stack"),
            address_of: words.register_keyword("address-of"),
            fn_call: words.register_keyword("fn-call"),
            quote: words.register_keyword("quote"),
            setq: words.register_keyword("setq"),

            plus: words.register_keyword("+"),
            minus: words.register_keyword("-"),
            star: words.register_keyword("*"),
            slash: words.register_keyword("/"),
            eq: words.register_keyword("="),
            lt: words.register_keyword("<"),
            gt: words.register_keyword(">"),
            kand: words.register_keyword("and"),
            kor: words.register_keyword("or"),
            knot: words.register_keyword("not"),
            sqrt: words.register_keyword("sqrt"),
            kmod: words.register_keyword("mod"),

            from: words.register_keyword("from"),
            to: words.register_keyword("to"),
            upto: words.register_keyword("upto"),
            increment: words.register_keyword("increment"),
            steps: words.register_keyword("steps"),
            quantity: words.register_keyword("quantity"),

            linear: words.register_keyword("linear"),
            quick: words.register_keyword("quick"),
            slow_in: words.register_keyword("slow-in"),
            slow_in_out: words.register_keyword("slow-in-out"),
            rgb: words.register_keyword("RGB"),
            hsl: words.register_keyword("HSL"),
            lab: words.register_keyword("LAB"),
            hsv: words.register_keyword("HSV"),

            canvas_width: words.register_keyword("canvas/width"),
            canvas_height: words.register_keyword("canvas/height"),
            white: words.register_keyword("white"),
            black: words.register_keyword("black"),
            red: words.register_keyword("red"),
            green: words.register_keyword("green"),
            blue: words.register_keyword("blue"),
            yellow: words.register_keyword("yellow"),
            magenta: words.register_keyword("magenta"),
            cyan: words.register_keyword("cyan"),

            seed: words.register_keyword("seed"),
            min: words.register_keyword("min"),
            max: words.register_keyword("max"),
            num: words.register_keyword("num"),
            vec1: words.register_keyword("vec1"),
            vec2: words.register_keyword("vec2"),
            vector: words.register_keyword("vector"),
            value: words.register_keyword("value"),
            element: words.register_keyword("element"),
            n: words.register_keyword("n"),
            x: words.register_keyword("x"),
            y: words.register_keyword("y"),
            z: words.register_keyword("z"),
        }
    }

    /// Is `iname` one of the two loop-iteration special forms (`loop`/`step`)?
    #[must_use]
    pub fn is_loop_form(&self, iname: Iname) -> bool {
        iname == self.kloop || iname == self.kstep
    }
}

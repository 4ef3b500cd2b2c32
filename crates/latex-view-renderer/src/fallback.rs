//! Plain-text approximation of math notation.
//!
//! Used when native rendering is switched off or a render failed. Rules are
//! applied strictly in order: structural rewrites first, then powers and
//! subscripts, named symbols, spacing, and only at the end the generic
//! backslash stripping that would otherwise eat the commands the earlier
//! rules look for. Brace arguments are matched one level deep.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// How a rule rewrites a match.
enum Rewrite {
    /// Regex replacement template (`${1}` style group references).
    Template(&'static str),
    /// Look up the first capture group in a glyph table; unknown names are
    /// left as they were.
    Glyph(fn(&str) -> Option<&'static str>),
}

struct Rule {
    name: &'static str,
    pattern: Regex,
    rewrite: Rewrite,
}

impl Rule {
    fn template(name: &'static str, pattern: &str, template: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            rewrite: Rewrite::Template(template),
        }
    }

    fn glyph(name: &'static str, pattern: &str, table: fn(&str) -> Option<&'static str>) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            rewrite: Rewrite::Glyph(table),
        }
    }

    fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match self.rewrite {
            Rewrite::Template(template) => self.pattern.replace_all(text, template),
            Rewrite::Glyph(table) => self.pattern.replace_all(text, |caps: &Captures<'_>| {
                table(&caps[1]).map_or_else(|| caps[0].to_owned(), str::to_owned)
            }),
        }
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        // structural, single brace level
        Rule::template("frac", r"\\frac\{([^{}]*)\}\{([^{}]*)\}", "(${1})/(${2})"),
        Rule::template("sqrt", r"\\sqrt\{([^{}]*)\}", "√(${1})"),
        // powers
        Rule::template("square", r"\^2", "²"),
        Rule::template("cube", r"\^3", "³"),
        Rule::template("nth-power", r"\^n", "ⁿ"),
        Rule::template("power", r"\^\{([^{}]*)\}", "^(${1})"),
        // subscripts
        Rule::template("subscript-group", r"_\{([^{}]*)\}", "[${1}]"),
        Rule::template("subscript-digit", r"_(\d)", "[${1}]"),
        // named letters, operators and relations
        Rule::glyph("symbol", r"\\([A-Za-z]+)", symbol_glyph),
        // spacing and sized delimiters
        Rule::template("thin-space", r"\\[,;:]", " "),
        Rule::template("negative-space", r"\\!", ""),
        Rule::template("quad", r"\\q?quad\b", "  "),
        Rule::template("left", r"\\left\\?([(\[{|])", "${1}"),
        Rule::template("right", r"\\right\\?([)\]}|])", "${1}"),
        Rule::template("sized-dot", r"\\(?:left|right)\.", ""),
        // anything still shaped like a command
        Rule::template("command", r"\\([A-Za-z]+)", "${1}"),
        Rule::template("whitespace", r"\s+", " "),
    ]
});

/// Best-effort readable rendering of `notation`, e.g. `\frac{a+b}{c}` becomes
/// `(a+b)/(c)` and `\alpha + \beta` becomes `α + β`.
pub fn format_for_display(notation: &str) -> String {
    let mut text = notation.to_owned();
    for rule in RULES.iter() {
        if let Cow::Owned(rewritten) = rule.apply(&text) {
            tracing::trace!(target: "latex_view::fallback", rule = rule.name, "rule applied");
            text = rewritten;
        }
    }
    text.trim().to_owned()
}

/// Unicode glyph for a named command, without its backslash.
pub fn symbol_glyph(name: &str) -> Option<&'static str> {
    let glyph = match name {
        // lowercase greek
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" | "varepsilon" => "ε",
        "zeta" => "ζ",
        "eta" => "η",
        "theta" | "vartheta" => "θ",
        "iota" => "ι",
        "kappa" => "κ",
        "lambda" => "λ",
        "mu" => "μ",
        "nu" => "ν",
        "xi" => "ξ",
        "pi" => "π",
        "rho" => "ρ",
        "sigma" => "σ",
        "tau" => "τ",
        "phi" | "varphi" => "φ",
        "chi" => "χ",
        "psi" => "ψ",
        "omega" => "ω",
        // uppercase greek
        "Gamma" => "Γ",
        "Delta" => "Δ",
        "Theta" => "Θ",
        "Lambda" => "Λ",
        "Pi" => "Π",
        "Sigma" => "Σ",
        "Phi" => "Φ",
        "Psi" => "Ψ",
        "Omega" => "Ω",
        // operators
        "cdot" => "·",
        "cdots" | "ldots" | "dots" => "···",
        "times" => "×",
        "div" => "÷",
        "pm" => "±",
        "mp" => "∓",
        "sqrt" => "√",
        "int" => "∫",
        "oint" => "∮",
        "sum" => "Σ",
        "prod" => "Π",
        "partial" => "∂",
        "nabla" => "∇",
        "infty" => "∞",
        "circ" => "∘",
        // relations
        "neq" | "ne" => "≠",
        "leq" | "le" => "≤",
        "geq" | "ge" => "≥",
        "approx" => "≈",
        "equiv" => "≡",
        "sim" => "∼",
        "propto" => "∝",
        // sets and logic
        "in" => "∈",
        "notin" => "∉",
        "subset" => "⊂",
        "subseteq" => "⊆",
        "supset" => "⊃",
        "cup" => "∪",
        "cap" => "∩",
        "emptyset" => "∅",
        "forall" => "∀",
        "exists" => "∃",
        "neg" => "¬",
        // arrows
        "to" | "rightarrow" => "→",
        "leftarrow" => "←",
        "Rightarrow" | "implies" => "⇒",
        "Leftrightarrow" | "iff" => "⇔",
        _ => return None,
    };
    Some(glyph)
}

//! Stroke categories and the substitution costs between them.
use std::io::Read;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StrokeAlignError, UnknownStrokeError};

/// Default cost of inserting or deleting a stroke.
pub const DEFAULT_INDEL_COST: f64 = 1.;
/// Default cost of substituting strokes of different families.
pub const DEFAULT_SUBSTITUTION_COST: f64 = 1.;
/// Default cost of substituting strokes of the same family.
pub const DEFAULT_FAMILY_COST: f64 = 0.5;

/// The 36 strokes of the Unicode CJK Strokes block (U+31C0..U+31E3),
/// as `(code, family, character)`.
const CJK_STROKES: [(&str, &str, char); 36] = [
    ("t", "rising", '\u{31C0}'),
    ("wg", "curve", '\u{31C1}'),
    ("xg", "curve", '\u{31C2}'),
    ("bxg", "curve", '\u{31C3}'),
    ("sw", "vertical", '\u{31C4}'),
    ("hzz", "horizontal", '\u{31C5}'),
    ("hzg", "horizontal", '\u{31C6}'),
    ("hp", "horizontal", '\u{31C7}'),
    ("hzwg", "horizontal", '\u{31C8}'),
    ("szwg", "vertical", '\u{31C9}'),
    ("hzt", "horizontal", '\u{31CA}'),
    ("hzzp", "horizontal", '\u{31CB}'),
    ("hpwg", "horizontal", '\u{31CC}'),
    ("hzw", "horizontal", '\u{31CD}'),
    ("hzzz", "horizontal", '\u{31CE}'),
    ("n", "falling", '\u{31CF}'),
    ("h", "horizontal", '\u{31D0}'),
    ("s", "vertical", '\u{31D1}'),
    ("p", "sweeping", '\u{31D2}'),
    ("sp", "vertical", '\u{31D3}'),
    ("d", "dot", '\u{31D4}'),
    ("hz", "horizontal", '\u{31D5}'),
    ("hg", "horizontal", '\u{31D6}'),
    ("sz", "vertical", '\u{31D7}'),
    ("swz", "vertical", '\u{31D8}'),
    ("st", "vertical", '\u{31D9}'),
    ("sg", "vertical", '\u{31DA}'),
    ("pd", "sweeping", '\u{31DB}'),
    ("pz", "sweeping", '\u{31DC}'),
    ("tn", "rising", '\u{31DD}'),
    ("szz", "vertical", '\u{31DE}'),
    ("swg", "vertical", '\u{31DF}'),
    ("hxwg", "horizontal", '\u{31E0}'),
    ("hzzzg", "horizontal", '\u{31E1}'),
    ("pg", "sweeping", '\u{31E2}'),
    ("q", "curve", '\u{31E3}'),
];

/// An immutable stroke category, valid only for the [`Taxonomy`] that resolved it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StrokeCategory(u16);

impl StrokeCategory {
    /// Gets the position of the category in its taxonomy.
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Definition of a single stroke category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Canonical code of the category.
    pub name: String,
    /// Family the category belongs to, e.g., `horizontal`.
    pub family: String,
    /// Additional codes resolving to this category.
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// An explicit substitution cost between two categories, applied in both directions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostOverride {
    /// Code of one category.
    pub a: String,
    /// Code of the other category.
    pub b: String,
    /// Substitution cost.
    pub cost: f64,
}

/// Serializable description of a [`Taxonomy`].
///
/// The substitution cost between two distinct categories is, in order of precedence,
/// the matching entry in `overrides`, `family_cost` when both share a family,
/// and `default_cost` otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    /// Cost of inserting or deleting a stroke.
    #[serde(default = "default_indel_cost")]
    pub indel_cost: f64,
    /// Cost of substituting strokes of different families.
    #[serde(default = "default_substitution_cost")]
    pub default_cost: f64,
    /// Cost of substituting strokes of the same family.
    #[serde(default = "default_family_cost")]
    pub family_cost: f64,
    /// Stroke categories, in index order.
    pub categories: Vec<CategoryConfig>,
    /// Explicit pair costs.
    #[serde(default)]
    pub overrides: Vec<CostOverride>,
}

const fn default_indel_cost() -> f64 {
    DEFAULT_INDEL_COST
}

const fn default_substitution_cost() -> f64 {
    DEFAULT_SUBSTITUTION_COST
}

const fn default_family_cost() -> f64 {
    DEFAULT_FAMILY_COST
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self::cjk()
    }
}

impl TaxonomyConfig {
    /// Creates an empty configuration with the given costs.
    pub const fn new(indel_cost: f64, default_cost: f64, family_cost: f64) -> Self {
        Self {
            indel_cost,
            default_cost,
            family_cost,
            categories: vec![],
            overrides: vec![],
        }
    }

    /// The CJK stroke set with the default costs.
    /// Each category is addressable by its lowercase code and its Unicode character.
    pub fn cjk() -> Self {
        let mut config = Self::new(
            DEFAULT_INDEL_COST,
            DEFAULT_SUBSTITUTION_COST,
            DEFAULT_FAMILY_COST,
        );
        for (name, family, c) in CJK_STROKES {
            config = config.category(name, family, [c.to_string()]);
        }
        config
    }

    /// Appends a category.
    pub fn category<I, S>(mut self, name: &str, family: &str, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.push(CategoryConfig {
            name: name.to_string(),
            family: family.to_string(),
            aliases: aliases.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Sets an explicit substitution cost between `a` and `b`.
    pub fn cost(mut self, a: &str, b: &str, cost: f64) -> Self {
        self.overrides.push(CostOverride {
            a: a.to_string(),
            b: b.to_string(),
            cost,
        });
        self
    }

    /// Deserializes a configuration from JSON.
    pub fn from_json<R>(rdr: R) -> Result<Self>
    where
        R: Read,
    {
        serde_json::from_reader(rdr)
            .map_err(|e| StrokeAlignError::input(format!("Malformed taxonomy JSON: {e}")))
    }
}

/// A fixed set of stroke categories with a total, symmetric substitution cost table.
#[derive(Clone, Debug)]
pub struct Taxonomy {
    names: Vec<String>,
    families: Vec<String>,
    lookup: HashMap<String, StrokeCategory>,
    costs: Vec<f64>,
    indel_cost: f64,
}

impl Taxonomy {
    /// Builds a taxonomy, validating the configuration.
    pub fn from_config(config: &TaxonomyConfig) -> Result<Self> {
        let n = config.categories.len();
        if n == 0 {
            return Err(StrokeAlignError::input(
                "A taxonomy needs one category at least.".to_string(),
            ));
        }
        if n > usize::from(u16::MAX) {
            return Err(StrokeAlignError::input(format!(
                "A taxonomy supports at most {} categories.",
                u16::MAX
            )));
        }
        check_cost("indel_cost", config.indel_cost)?;
        check_cost("default_cost", config.default_cost)?;
        check_cost("family_cost", config.family_cost)?;

        let mut names = Vec::with_capacity(n);
        let mut families = Vec::with_capacity(n);
        let mut lookup = HashMap::new();
        for (i, category) in config.categories.iter().enumerate() {
            let cat = StrokeCategory(i as u16);
            for code in std::iter::once(&category.name).chain(category.aliases.iter()) {
                if code.is_empty() {
                    return Err(StrokeAlignError::input(
                        "Stroke codes must not be empty.".to_string(),
                    ));
                }
                if lookup.insert(code.clone(), cat).is_some() {
                    return Err(StrokeAlignError::input(format!(
                        "Stroke code {code:?} is defined twice."
                    )));
                }
            }
            names.push(category.name.clone());
            families.push(category.family.clone());
        }

        let mut costs = vec![0.; n * n];
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    costs[i * n + j] = if families[i] == families[j] {
                        config.family_cost
                    } else {
                        config.default_cost
                    };
                }
            }
        }

        let mut taxonomy = Self {
            names,
            families,
            lookup,
            costs,
            indel_cost: config.indel_cost,
        };
        for o in &config.overrides {
            check_cost("override", o.cost)?;
            let a = taxonomy.resolve(&o.a).map_err(override_error)?;
            let b = taxonomy.resolve(&o.b).map_err(override_error)?;
            if a == b && o.cost != 0. {
                return Err(StrokeAlignError::input(format!(
                    "Substituting {:?} with itself must cost 0.",
                    o.a
                )));
            }
            taxonomy.costs[a.index() * n + b.index()] = o.cost;
            taxonomy.costs[b.index() * n + a.index()] = o.cost;
        }
        Ok(taxonomy)
    }

    /// Builds the CJK stroke taxonomy with the default costs.
    pub fn cjk() -> Self {
        Self::from_config(&TaxonomyConfig::cjk()).expect("the built-in CJK taxonomy is valid")
    }

    /// Gets the number of categories.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Checks if the taxonomy has no category, which never holds for a built one.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates over all categories in index order.
    pub fn categories(&self) -> impl Iterator<Item = StrokeCategory> + '_ {
        (0..self.len()).map(|i| StrokeCategory(i as u16))
    }

    /// Gets the canonical code of a category.
    pub fn name(&self, cat: StrokeCategory) -> &str {
        &self.names[cat.index()]
    }

    /// Gets the family of a category.
    pub fn family(&self, cat: StrokeCategory) -> &str {
        &self.families[cat.index()]
    }

    /// Resolves a single stroke code.
    pub fn resolve(&self, code: &str) -> Result<StrokeCategory, UnknownStrokeError> {
        self.lookup
            .get(code)
            .copied()
            .ok_or_else(|| UnknownStrokeError::new(code, 0))
    }

    /// Resolves a stroke-code sequence, failing on the first unknown code.
    pub fn resolve_all<I, S>(&self, codes: I) -> Result<Vec<StrokeCategory>, UnknownStrokeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes
            .into_iter()
            .enumerate()
            .map(|(i, code)| {
                let code = code.as_ref();
                self.lookup
                    .get(code)
                    .copied()
                    .ok_or_else(|| UnknownStrokeError::new(code, i))
            })
            .collect()
    }

    /// Gets the substitution cost between two categories.
    #[inline(always)]
    pub fn cost(&self, a: StrokeCategory, b: StrokeCategory) -> f64 {
        self.costs[a.index() * self.len() + b.index()]
    }

    /// Gets the cost of inserting or deleting a stroke.
    #[inline(always)]
    pub const fn indel_cost(&self) -> f64 {
        self.indel_cost
    }
}

fn check_cost(what: &str, cost: f64) -> Result<()> {
    if cost.is_finite() && cost >= 0. {
        Ok(())
    } else {
        Err(StrokeAlignError::input(format!(
            "{what} must be a non-negative finite number, got {cost}."
        )))
    }
}

fn override_error(e: UnknownStrokeError) -> StrokeAlignError {
    StrokeAlignError::input(format!("Cost override refers to an unknown stroke: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> TaxonomyConfig {
        TaxonomyConfig::new(1., 1., 0.5)
            .category("vert", "vertical", ["|"])
            .category("horiz", "horizontal", ["-"])
            .category("dot", "dot", Vec::<String>::new())
            .category("hook", "vertical", Vec::<String>::new())
    }

    #[test]
    fn test_cjk_is_valid() {
        let taxonomy = Taxonomy::cjk();
        assert_eq!(taxonomy.len(), 36);
        let h = taxonomy.resolve("h").unwrap();
        assert_eq!(taxonomy.resolve("\u{31D0}").unwrap(), h);
        assert_eq!(taxonomy.name(h), "h");
        assert_eq!(taxonomy.family(h), "horizontal");
    }

    #[test]
    fn test_costs_are_total_and_symmetric() {
        let taxonomy = Taxonomy::cjk();
        for a in taxonomy.categories() {
            assert_eq!(taxonomy.cost(a, a), 0.);
            for b in taxonomy.categories() {
                assert_eq!(taxonomy.cost(a, b), taxonomy.cost(b, a));
                assert!(taxonomy.cost(a, b) >= 0.);
            }
        }
    }

    #[test]
    fn test_family_and_default_costs() {
        let taxonomy = Taxonomy::from_config(&small_config()).unwrap();
        let vert = taxonomy.resolve("vert").unwrap();
        let horiz = taxonomy.resolve("-").unwrap();
        let hook = taxonomy.resolve("hook").unwrap();
        assert_eq!(taxonomy.cost(vert, horiz), 1.);
        assert_eq!(taxonomy.cost(vert, hook), 0.5);
        assert_eq!(taxonomy.indel_cost(), 1.);
    }

    #[test]
    fn test_override_applies_both_ways() {
        let config = small_config().cost("dot", "vert", 0.25);
        let taxonomy = Taxonomy::from_config(&config).unwrap();
        let vert = taxonomy.resolve("vert").unwrap();
        let dot = taxonomy.resolve("dot").unwrap();
        assert_eq!(taxonomy.cost(vert, dot), 0.25);
        assert_eq!(taxonomy.cost(dot, vert), 0.25);
    }

    #[test]
    fn test_resolve_all_reports_position() {
        let taxonomy = Taxonomy::from_config(&small_config()).unwrap();
        let err = taxonomy.resolve_all(["vert", "-", "zigzag"]).unwrap_err();
        assert_eq!(err.code(), "zigzag");
        assert_eq!(err.position(), 2);
        assert!(matches!(
            StrokeAlignError::from(err),
            StrokeAlignError::UnknownStroke(_)
        ));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(Taxonomy::from_config(&TaxonomyConfig::new(1., 1., 1.)).is_err());
        assert!(Taxonomy::from_config(&small_config().cost("vert", "horiz", -1.)).is_err());
        assert!(Taxonomy::from_config(&small_config().cost("vert", "vert", 2.)).is_err());
        assert!(Taxonomy::from_config(&small_config().cost("vert", "nope", 1.)).is_err());
        assert!(Taxonomy::from_config(&small_config().category("dup", "x", ["|"])).is_err());
        let mut config = small_config();
        config.indel_cost = f64::NAN;
        assert!(Taxonomy::from_config(&config).is_err());
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "indel_cost": 2.0,
            "categories": [
                {"name": "a", "family": "x"},
                {"name": "b", "family": "x", "aliases": ["B"]}
            ],
            "overrides": [{"a": "a", "b": "B", "cost": 0.1}]
        }"#;
        let config = TaxonomyConfig::from_json(json.as_bytes()).unwrap();
        assert_eq!(config.default_cost, DEFAULT_SUBSTITUTION_COST);
        let taxonomy = Taxonomy::from_config(&config).unwrap();
        let a = taxonomy.resolve("a").unwrap();
        let b = taxonomy.resolve("b").unwrap();
        assert_eq!(taxonomy.indel_cost(), 2.);
        assert_eq!(taxonomy.cost(a, b), 0.1);
        assert!(TaxonomyConfig::from_json("{".as_bytes()).is_err());
    }
}

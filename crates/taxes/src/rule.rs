use serde::{Deserialize, Serialize};

use crate::tax::TaxId;

/// One mapping of a customer tax rule.
///
/// An empty `origin_tax` matches any tax; an empty `tax` removes the tax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRuleLine {
    pub origin_tax: Option<TaxId>,
    pub tax: Option<TaxId>,
}

impl TaxRuleLine {
    fn matches(&self, origin: Option<TaxId>) -> bool {
        match self.origin_tax {
            None => true,
            Some(wanted) => origin == Some(wanted),
        }
    }
}

/// Customer-specific tax substitution applied when a product is put on a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRule {
    pub lines: Vec<TaxRuleLine>,
}

impl TaxRule {
    /// Replacement taxes for `origin`, `None` when no line matches.
    ///
    /// `apply(None)` asks for taxes the rule adds regardless of the product.
    pub fn apply(&self, origin: Option<TaxId>) -> Option<Vec<TaxId>> {
        self.lines
            .iter()
            .find(|line| line.matches(origin))
            .map(|line| line.tax.into_iter().collect())
    }

    /// Map a product's taxes through the rule: matched taxes are replaced,
    /// unmatched ones kept, then any unconditional additions are appended.
    pub fn map_taxes(&self, origin: &[TaxId]) -> Vec<TaxId> {
        fn push(id: TaxId, out: &mut Vec<TaxId>) {
            if !out.contains(&id) {
                out.push(id);
            }
        }

        let mut out: Vec<TaxId> = Vec::new();

        for tax in origin {
            match self.apply(Some(*tax)) {
                Some(replacements) => {
                    for id in replacements {
                        push(id, &mut out);
                    }
                }
                None => push(*tax, &mut out),
            }
        }

        if let Some(extra) = self.apply(None) {
            for id in extra {
                push(id, &mut out);
            }
        }
        out
    }
}

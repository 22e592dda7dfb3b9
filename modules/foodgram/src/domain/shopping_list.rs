use std::collections::BTreeMap;

use crate::domain::repo::CartLine;

pub const HEADER: &str = "Shopping list:";
pub const FILE_NAME: &str = "shopping_cart.txt";

/// Sum amounts per (name, unit), ordered by name then unit.
pub fn aggregate(lines: impl IntoIterator<Item = CartLine>) -> Vec<CartLine> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in lines {
        *totals
            .entry((line.name, line.measurement_unit))
            .or_default() += line.amount;
    }
    totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| CartLine {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}

/// `Shopping list:`, a blank line, then one `name, amount unit` per line.
pub fn render(lines: &[CartLine]) -> String {
    let body: Vec<String> = lines
        .iter()
        .map(|l| format!("{}, {} {}", l.name, l.amount, l.measurement_unit))
        .collect();
    format!("{HEADER}\n\n{}", body.join("\n"))
}

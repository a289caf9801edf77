/// Format an amount with thousands separators: `money(1234567.0, "₫", 0)` → `₫1,234,567`.
pub fn money(val: f64, symbol: &str, decimals: usize) -> String {
    let negative = val < 0.0;
    let fixed = format!("{:.*}", decimals, val.abs());
    let (int_part, dec_part) = match fixed.split_once('.') {
        Some((i, d)) => (i, Some(d)),
        None => (fixed.as_str(), None),
    };

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();
    let sign = if negative { "-" } else { "" };

    match dec_part {
        Some(d) => format!("{sign}{symbol}{with_commas}.{d}"),
        None => format!("{sign}{symbol}{with_commas}"),
    }
}

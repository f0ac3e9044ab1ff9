//! Sequential running-balance computation.
//!
//! Each closing balance depends on its predecessor, so this is strictly
//! ordered within one account section. Parallelism only ever happens
//! across independent sections and files, never inside this loop.

use rust_decimal::Decimal;

/// Given an opening balance and (charge, credit) movements in row order,
/// returns the closing balance after each movement.
///
/// `closing[0] = opening + charge[0] - credit[0]`, and every later entry
/// builds on the previous closing. Negative balances are valid output.
pub fn running_balances(opening: Decimal, movements: &[(Decimal, Decimal)]) -> Vec<Decimal> {
    let mut closings = Vec::with_capacity(movements.len());
    let mut balance = opening;
    for (charge, credit) in movements {
        balance = balance + charge - credit;
        closings.push(balance);
    }
    closings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_basic_sequence() {
        // Opening 100.00, +50.00, then -30.00.
        let closings = running_balances(
            dec("100.00"),
            &[
                (dec("50.00"), dec("0")),
                (dec("0"), dec("30.00")),
            ],
        );
        assert_eq!(closings, vec![dec("150.00"), dec("120.00")]);
    }

    #[test]
    fn test_empty_movements() {
        assert!(running_balances(dec("10.00"), &[]).is_empty());
    }

    #[test]
    fn test_negative_balances_preserved() {
        let closings = running_balances(
            dec("5.00"),
            &[(dec("0"), dec("12.50")), (dec("2.00"), dec("0"))],
        );
        assert_eq!(closings, vec![dec("-7.50"), dec("-5.50")]);
    }

    #[test]
    fn test_chain_invariant() {
        let movements: Vec<(Decimal, Decimal)> = (1..=50)
            .map(|i| (Decimal::new(i * 3, 2), Decimal::new(i, 2)))
            .collect();
        let opening = dec("7.31");
        let closings = running_balances(opening, &movements);
        assert_eq!(closings[0], opening + movements[0].0 - movements[0].1);
        for i in 1..closings.len() {
            assert_eq!(
                closings[i],
                closings[i - 1] + movements[i].0 - movements[i].1
            );
        }
    }

    #[test]
    fn test_no_drift_over_ten_thousand_fractional_rows() {
        // 10,000 charges of one cent must land exactly on +100.00.
        let movements = vec![(dec("0.01"), dec("0")); 10_000];
        let closings = running_balances(dec("0.00"), &movements);
        assert_eq!(closings.last().copied(), Some(dec("100.00")));
    }
}

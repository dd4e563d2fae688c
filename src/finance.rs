//! Financial derivation rules for loan origination.

use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::form::LoanFormData;
use crate::services::CustomerLoan;

/// repayment share of the running loan that unlocks a reloan
const RELOAN_THRESHOLD: Decimal = dec!(0.70);

/// sum of processing, documentation and insurance fees; empty fields count
/// as zero
pub fn total_fees(form: &LoanFormData) -> Money {
    Money::parse_form_field(&form.processing_fee)
        + Money::parse_form_field(&form.documentation_fee)
        + Money::parse_form_field(&form.insurance_fee)
}

/// amount actually paid out: loan amount less all fees
pub fn net_disbursement(form: &LoanFormData) -> Money {
    Money::parse_form_field(&form.loan_amount) - total_fees(form)
}

/// flat-interest installment: interest is principal x rate/100 for the whole
/// term, rental is (principal + interest) / terms rounded half-up to cents;
/// zero when terms is not positive
pub fn rental(principal: Money, interest_rate_pct: Decimal, terms: i64) -> Money {
    if terms <= 0 {
        return Money::ZERO;
    }
    let principal = principal.as_decimal();
    let interest = principal * interest_rate_pct / Decimal::from(100);
    let per_term = (principal + interest) / Decimal::from(terms);
    Money::from_decimal(per_term.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// first-due-date scheduling result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirstDueDate {
    pub first_due_date: NaiveDate,
    pub due_day: u32,
}

/// first rental due date from the activation date, per the collections
/// calendar:
/// activation day 1-7 -> 15th same month, 8-14 -> 22nd same month,
/// 15-21 -> 1st next month, 22-eom -> 8th next month.
///
/// Works on calendar components only so the result never shifts across
/// timezones.
pub fn first_due_date(activation: NaiveDate) -> FirstDueDate {
    let (year, month, day) = (activation.year(), activation.month(), activation.day());
    let (due_year, due_month, due_day) = match day {
        1..=7 => (year, month, 15),
        8..=14 => (year, month, 22),
        15..=21 => next_month(year, month, 1),
        _ => next_month(year, month, 8),
    };
    // day 1..=22 exists in every month, so the construction cannot fail
    let date = NaiveDate::from_ymd_opt(due_year, due_month, due_day)
        .unwrap_or(activation);
    FirstDueDate {
        first_due_date: date,
        due_day,
    }
}

fn next_month(year: i32, month: u32, day: u32) -> (i32, u32, u32) {
    if month == 12 {
        (year + 1, 1, day)
    } else {
        (year, month + 1, day)
    }
}

/// tenure-keyed processing fee tier: 48 periods -> 4% of the loan amount,
/// 72 -> 6%; any other tenure leaves the fee to the caller
pub fn processing_fee_for_tenure(tenure: u32, loan_amount: Money) -> Option<Money> {
    match tenure {
        48 => Some(loan_amount.percentage(dec!(4))),
        72 => Some(loan_amount.percentage(dec!(6))),
        _ => None,
    }
}

/// outcome of the reloan policy gate for one active loan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReloanAssessment {
    pub is_eligible: bool,
    /// repayment progress as a percentage in 0..=100
    pub progress: Decimal,
    /// outstanding balance to deduct from the new disbursement; zero when
    /// not eligible
    pub deduction: Money,
}

/// assess reloan eligibility for an active loan. Backend-supplied
/// `reloan_eligibility` wins when present; the local formula is a
/// degraded-mode estimate: total obligation is `fuil_amount` when positive,
/// else principal plus flat interest, and progress is the repaid share of
/// that total. The 70% boundary is inclusive.
pub fn reloan_assessment(loan: &CustomerLoan) -> ReloanAssessment {
    let (is_eligible, progress) = match &loan.reloan_eligibility {
        Some(e) => (e.is_eligible, e.progress),
        None => {
            let total = if loan.fuil_amount.is_positive() {
                loan.fuil_amount.as_decimal()
            } else {
                let principal = loan.approved_amount.as_decimal();
                principal + principal * loan.interest_rate / Decimal::from(100)
            };
            if total <= Decimal::ZERO {
                (false, Decimal::ZERO)
            } else {
                let paid = (total - loan.outstanding_amount.as_decimal()).max(Decimal::ZERO);
                let fraction = paid / total;
                (fraction >= RELOAN_THRESHOLD, fraction * Decimal::from(100))
            }
        }
    };

    let deduction = if is_eligible {
        loan.outstanding_amount
    } else {
        Money::ZERO
    };

    ReloanAssessment {
        is_eligible,
        progress,
        deduction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LoanStatus;
    use uuid::Uuid;

    fn active_loan(approved: i64, rate: Decimal, outstanding: i64, fuil: i64) -> CustomerLoan {
        CustomerLoan {
            id: Uuid::new_v4(),
            status: LoanStatus::Active,
            approved_amount: Money::from_major(approved),
            interest_rate: rate,
            outstanding_amount: Money::from_major(outstanding),
            fuil_amount: Money::from_major(fuil),
            terms: 48,
            product_id: "p1".to_string(),
            reloan_eligibility: None,
        }
    }

    #[test]
    fn test_fee_totals_tolerate_empty_fields() {
        let mut form = LoanFormData::default();
        form.loan_amount = "50000".to_string();
        form.processing_fee = "2000.00".to_string();
        form.documentation_fee = String::new();
        form.insurance_fee = "500".to_string();

        assert_eq!(total_fees(&form), Money::from_major(2500));
        assert_eq!(net_disbursement(&form), Money::from_major(47_500));
    }

    #[test]
    fn test_rental_flat_interest() {
        let r = rental(Money::from_major(10_000), dec!(20), 10);
        assert_eq!(r.to_field_string(), "1200.00");
    }

    #[test]
    fn test_rental_terms_guard() {
        assert_eq!(rental(Money::from_major(100), dec!(10), 0), Money::ZERO);
        assert_eq!(rental(Money::from_major(100), dec!(10), -4), Money::ZERO);
    }

    #[test]
    fn test_rental_rounds_half_up() {
        // (1000 + 0) / 3 = 333.333... -> 333.33; (1000 + 2.5%) / 4 = 256.25
        assert_eq!(rental(Money::from_major(1000), Decimal::ZERO, 3).to_field_string(), "333.33");
        assert_eq!(rental(Money::from_major(1000), dec!(2.5), 4).to_field_string(), "256.25");
    }

    #[test]
    fn test_first_due_date_brackets() {
        let march = |d| NaiveDate::from_ymd_opt(2024, 3, d).unwrap();

        let early = first_due_date(march(5));
        assert_eq!(early.due_day, 15);
        assert_eq!(early.first_due_date, march(15));

        let mid = first_due_date(march(10));
        assert_eq!(mid.due_day, 22);
        assert_eq!(mid.first_due_date, march(22));

        let late = first_due_date(march(18));
        assert_eq!(late.due_day, 1);
        assert_eq!(late.first_due_date, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());

        let eom = first_due_date(march(28));
        assert_eq!(eom.due_day, 8);
        assert_eq!(eom.first_due_date, NaiveDate::from_ymd_opt(2024, 4, 8).unwrap());
    }

    #[test]
    fn test_first_due_date_december_rolls_over() {
        let activation = NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        let due = first_due_date(activation);
        assert_eq!(due.due_day, 8);
        assert_eq!(due.first_due_date, NaiveDate::from_ymd_opt(2025, 1, 8).unwrap());
    }

    #[test]
    fn test_fee_tier() {
        let amount = Money::from_major(50_000);
        assert_eq!(
            processing_fee_for_tenure(48, amount).map(|m| m.to_field_string()),
            Some("2000.00".to_string())
        );
        assert_eq!(
            processing_fee_for_tenure(72, amount).map(|m| m.to_field_string()),
            Some("3000.00".to_string())
        );
        assert_eq!(processing_fee_for_tenure(36, amount), None);
    }

    #[test]
    fn test_reloan_boundary_inclusive() {
        // paid 7000 of 10000 -> exactly 70%
        let at_boundary = active_loan(10_000, dec!(20), 3_000, 10_000);
        let a = reloan_assessment(&at_boundary);
        assert!(a.is_eligible);
        assert_eq!(a.progress, Decimal::from(70));
        assert_eq!(a.deduction, Money::from_major(3_000));

        // paid 6990 of 10000 -> 69.9%
        let below = active_loan(10_000, dec!(20), 3_010, 10_000);
        let b = reloan_assessment(&below);
        assert!(!b.is_eligible);
        assert_eq!(b.deduction, Money::ZERO);
    }

    #[test]
    fn test_reloan_falls_back_to_flat_interest_total() {
        // no fuil_amount: total = 10000 * 1.2 = 12000, paid = 12000 - 3000
        let loan = active_loan(10_000, dec!(20), 3_000, 0);
        let a = reloan_assessment(&loan);
        assert!(a.is_eligible); // 9000 / 12000 = 75%
        assert_eq!(a.deduction, Money::from_major(3_000));
    }

    #[test]
    fn test_reloan_prefers_backend_verdict() {
        use crate::services::ReloanEligibility;
        // local formula would say eligible; backend says no
        let mut loan = active_loan(10_000, dec!(20), 1_000, 10_000);
        loan.reloan_eligibility = Some(ReloanEligibility {
            is_eligible: false,
            progress: dec!(55),
            balance: Money::from_major(1_000),
            paid_weeks: 22,
            total_weeks: 40,
        });
        let a = reloan_assessment(&loan);
        assert!(!a.is_eligible);
        assert_eq!(a.progress, dec!(55));
        assert_eq!(a.deduction, Money::ZERO);
    }

    #[test]
    fn test_tenure_48_and_72_vectors() {
        // recalculation hook used by the form when tenure or amount changes
        let amount = Money::parse_form_field("50000");
        let fee48 = processing_fee_for_tenure(48, amount).unwrap();
        assert_eq!(fee48.to_field_string(), "2000.00");
    }
}

//! Transaction record - 수집 대상 거래 한 건
//!
//! 테이블 한 행(`<tr>`)의 셀 세 개(account / transaction / amount+currency)를
//! 도메인 값으로 변환합니다. `transaction` 필드가 중복 판정 키입니다.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 행 하나가 가져야 하는 셀 개수
pub const CELLS_PER_ROW: usize = 3;

static NON_AMOUNT_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9.\-]+").expect("valid amount pattern"));

static NON_CURRENCY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9.,+\-\s]+").expect("valid currency pattern"));

/// One row of the scraped transaction table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub account: String,
    /// Dedup key
    pub transaction: String,
    pub amount: f64,
    pub currency: String,
}

impl TransactionRecord {
    pub fn new(
        account: impl Into<String>,
        transaction: impl Into<String>,
        amount: f64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            transaction: transaction.into(),
            amount,
            currency: currency.into(),
        }
    }

    /// Parse a table row from its cell contents.
    ///
    /// Returns `None` unless the row has exactly [`CELLS_PER_ROW`] cells; callers
    /// drop such rows instead of failing the page.
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Option<Self> {
        let [account, transaction, amount] = cells else {
            return None;
        };
        let raw_amount = amount.as_ref().trim();
        Some(Self {
            account: account.as_ref().trim().to_string(),
            transaction: transaction.as_ref().trim().to_string(),
            amount: extract_amount(raw_amount),
            currency: extract_currency(raw_amount),
        })
    }

    /// Key used by [`crate::domain::DuplicatePolicy::KeyOnly`].
    pub fn key(&self) -> &str {
        &self.transaction
    }

    /// 네 필드가 모두 같은지 비교 (`FullField` 정책)
    pub fn same_fields(&self, other: &Self) -> bool {
        self.transaction == other.transaction
            && self.account == other.account
            && self.currency == other.currency
            && self.amount == other.amount
    }
}

/// `$234.43` / `234.43$` -> `234.43`
///
/// Empty input is `0.0`; anything that still does not parse is `NaN`, which
/// serializes as `null`.
pub fn extract_amount(raw: &str) -> f64 {
    let digits = NON_AMOUNT_CHARS.replace_all(raw, "");
    if digits.is_empty() {
        return 0.0;
    }
    digits.parse::<f64>().unwrap_or(f64::NAN)
}

/// `$-45.20` -> `$`, `234€` -> `€`
pub fn extract_currency(raw: &str) -> String {
    NON_CURRENCY_CHARS.replace_all(raw, "").to_string()
}

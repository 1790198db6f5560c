use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical statement line items used by the valuation.
///
/// Providers label the same concept differently ("EBIT" vs "Ebit", "Net PPE"
/// vs "Property Plant Equipment Net"). Each canonical item owns an ordered
/// alias list; the first alias present in a period wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineItem {
    TotalRevenue,
    Ebit,
    TaxProvision,
    PretaxIncome,
    InterestExpense,
    Depreciation,
    CapitalExpenditure,
    TotalDebt,
    CashAndEquivalents,
    MinorityInterest,
    WorkingCapital,
    NetFixedAssets,
}

impl LineItem {
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            LineItem::TotalRevenue => &["Total Revenue", "Operating Revenue", "Revenue"],
            LineItem::Ebit => &["EBIT", "Ebit", "Operating Income"],
            LineItem::TaxProvision => &["Tax Provision", "Income Tax Expense"],
            LineItem::PretaxIncome => &["Pretax Income", "Income Before Tax"],
            LineItem::InterestExpense => &["Interest Expense", "Interest Expense Non Operating"],
            LineItem::Depreciation => &[
                "Depreciation",
                "Depreciation And Amortization",
                "Depreciation Amortization Depletion",
            ],
            LineItem::CapitalExpenditure => &["Capital Expenditure", "Capital Expenditures"],
            LineItem::TotalDebt => &["Total Debt"],
            LineItem::CashAndEquivalents => &[
                "Cash Cash Equivalents And Short Term Investments",
                "Cash And Cash Equivalents",
            ],
            LineItem::MinorityInterest => &["Minority Interest"],
            LineItem::WorkingCapital => &["Working Capital"],
            LineItem::NetFixedAssets => &["Net PPE", "Property Plant Equipment Net"],
        }
    }

    /// Primary (display) label.
    pub const fn label(self) -> &'static str {
        self.aliases()[0]
    }
}

impl fmt::Display for LineItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Balance-sheet lines summed into total current assets.
pub const CURRENT_ASSET_FIELDS: &[&str] = &[
    "Cash And Cash Equivalents",
    "Cash Equivalents",
    "Cash Financial",
    "Other Short Term Investments",
    "Accounts Receivable",
    "Inventory",
    "Prepaid Assets",
    "Other Current Assets",
    "Restricted Cash",
    "Taxes Receivable",
    "Other Receivables",
];

/// Balance-sheet lines summed into total current liabilities.
pub const CURRENT_LIABILITY_FIELDS: &[&str] = &[
    "Accounts Payable",
    "Payables",
    "Other Payable",
    "Dividends Payable",
    "Total Tax Payable",
    "Current Provisions",
    "Other Current Liabilities",
    "Current Debt And Capital Lease Obligation",
    "Current Capital Lease Obligation",
    "Pensionand Other Post Retirement Benefit Plans Current",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_item_has_a_label() {
        let items = [
            LineItem::TotalRevenue,
            LineItem::Ebit,
            LineItem::TaxProvision,
            LineItem::PretaxIncome,
            LineItem::InterestExpense,
            LineItem::Depreciation,
            LineItem::CapitalExpenditure,
            LineItem::TotalDebt,
            LineItem::CashAndEquivalents,
            LineItem::MinorityInterest,
            LineItem::WorkingCapital,
            LineItem::NetFixedAssets,
        ];
        for item in items {
            assert!(!item.aliases().is_empty());
            assert_eq!(item.to_string(), item.aliases()[0]);
        }
    }

    #[test]
    fn test_ebit_aliases_cover_provider_spellings() {
        assert!(LineItem::Ebit.aliases().contains(&"EBIT"));
        assert!(LineItem::Ebit.aliases().contains(&"Ebit"));
        assert!(LineItem::NetFixedAssets
            .aliases()
            .contains(&"Property Plant Equipment Net"));
    }
}

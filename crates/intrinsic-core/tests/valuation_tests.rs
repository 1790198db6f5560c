mod common;

use common::{company, config, provider, peer_specs, CompanySpec, INDEX};
use intrinsic_core::market_data::MarketDataProvider;
use intrinsic_core::valuation::{beta, dcf, growth, wacc, CompanyData};
use intrinsic_core::IntrinsicError;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// WACC tests
// ===========================================================================

#[test]
fn test_wacc_indian_it_services_reference() {
    // Rf = 7.2%, ERP = 5%, industry Beta_U = 0.85, D/E = 0.02
    // Kd = 8%, t = 25%, D/V ≈ 2%, E/V ≈ 98%
    let input = wacc::WaccInput {
        risk_free_rate: dec!(0.072),
        equity_risk_premium: dec!(0.05),
        unlevered_beta: dec!(0.85),
        debt_to_equity: dec!(0.02),
        cost_of_debt: dec!(0.08),
        tax_rate: dec!(0.25),
        debt_weight: dec!(0.02),
        equity_weight: dec!(0.98),
        size_premium: None,
        country_risk_premium: None,
        specific_risk_premium: None,
    };
    let result = wacc::calculate_wacc(&input).unwrap();
    // Beta_L = 0.85 * (1 + 0.75 * 0.02) = 0.86275
    // Ke = 0.072 + 0.86275 * 0.05 = 0.1151375
    // WACC = 0.1151375 * 0.98 + 0.06 * 0.02 = 0.11403475
    assert_eq!(result.result.relevered_beta, dec!(0.86275));
    assert!(
        (result.result.wacc - dec!(0.11403475)).abs() < dec!(0.0000001),
        "Expected WACC ~11.4%, got {}",
        result.result.wacc
    );
    assert!(result.warnings.is_empty());
}

#[test]
fn test_wacc_hamada_relevering_raises_cost_of_equity() {
    let base = wacc::WaccInput {
        risk_free_rate: dec!(0.04),
        equity_risk_premium: dec!(0.055),
        unlevered_beta: dec!(0.80),
        debt_to_equity: Decimal::ZERO,
        cost_of_debt: dec!(0.06),
        tax_rate: dec!(0.21),
        debt_weight: Decimal::ZERO,
        equity_weight: Decimal::ONE,
        size_premium: None,
        country_risk_premium: None,
        specific_risk_premium: None,
    };
    let levered = wacc::WaccInput {
        debt_to_equity: dec!(0.5),
        debt_weight: dec!(0.3333),
        equity_weight: dec!(0.6667),
        ..base.clone()
    };
    let unlevered_out = wacc::calculate_wacc(&base).unwrap().result;
    let levered_out = wacc::calculate_wacc(&levered).unwrap().result;
    assert!(levered_out.cost_of_equity > unlevered_out.cost_of_equity);
    assert!(levered_out.relevered_beta > unlevered_out.relevered_beta);
}

#[test]
fn test_estimate_wacc_from_fixture() {
    let specs = peer_specs();
    let provider = provider(&specs);
    let window = config(&["AAA"]).estimation_window().unwrap();
    let market = provider.price_history(INDEX, window.start, window.end).unwrap();
    let company = CompanyData::fetch(&provider, "BBB", window.start, window.end).unwrap();

    let breakdown =
        wacc::estimate_wacc(&company, &market, dec!(1.0), &window, dec!(0.072), 3).unwrap();

    assert!((breakdown.levered_beta - dec!(1.2)).abs() < dec!(0.001));
    assert!((breakdown.tax_rate - dec!(0.25)).abs() < dec!(0.0000001));
    // interest is 8% of a constant debt balance
    assert!((breakdown.cost_of_debt_pre_tax - dec!(0.08)).abs() < dec!(0.0000001));
    assert!((breakdown.cost_of_debt_after_tax - dec!(0.06)).abs() < dec!(0.0000001));
    assert!(
        (breakdown.equity_weight + breakdown.debt_weight - Decimal::ONE).abs() < dec!(0.0000001)
    );
    assert_eq!(
        breakdown.equity_risk_premium,
        breakdown.market_return - breakdown.risk_free_rate
    );
    let expected = breakdown.cost_of_equity * breakdown.equity_weight
        + breakdown.cost_of_debt_after_tax * breakdown.debt_weight;
    assert!((breakdown.wacc - expected).abs() < dec!(0.0000001));
}

#[test]
fn test_estimate_wacc_tolerates_negative_effective_tax_rate() {
    let mut credited = CompanySpec::new("TXC", dec!(1.0), dec!(500));
    credited.tax_rate = dec!(-0.10);
    let provider = provider(&[credited]);
    let window = config(&["TXC"]).estimation_window().unwrap();
    let market = provider.price_history(INDEX, window.start, window.end).unwrap();
    let company = CompanyData::fetch(&provider, "TXC", window.start, window.end).unwrap();

    let breakdown =
        wacc::estimate_wacc(&company, &market, dec!(0.9), &window, dec!(0.072), 3).unwrap();

    assert!((breakdown.tax_rate - dec!(-0.10)).abs() < dec!(0.0000001));
    // Kd_at = 8% * 1.10
    assert!((breakdown.cost_of_debt_after_tax - dec!(0.088)).abs() < dec!(0.0000001));
    assert!(breakdown.warnings.iter().any(|w| w.contains("outside [0, 1]")));
}

#[test]
fn test_estimate_wacc_tolerates_non_positive_industry_beta() {
    let specs = peer_specs();
    let provider = provider(&specs);
    let window = config(&["AAA"]).estimation_window().unwrap();
    let market = provider.price_history(INDEX, window.start, window.end).unwrap();
    let company = CompanyData::fetch(&provider, "AAA", window.start, window.end).unwrap();

    let breakdown =
        wacc::estimate_wacc(&company, &market, dec!(-0.2), &window, dec!(0.072), 3).unwrap();

    assert!(breakdown.relevered_beta < Decimal::ZERO);
    assert!(breakdown
        .warnings
        .iter()
        .any(|w| w.contains("Non-positive industry unlevered beta")));
}

// ===========================================================================
// Beta tests
// ===========================================================================

#[test]
fn test_median_unlevered_beta_is_middle_peer() {
    let specs = peer_specs();
    let provider = provider(&specs);
    let window = config(&["AAA"]).estimation_window().unwrap();
    let market = provider.price_history(INDEX, window.start, window.end).unwrap();
    let peers: Vec<String> = specs.iter().map(|s| s.symbol.to_string()).collect();

    let summary = beta::median_unlevered_beta(&provider, &peers, &market, &window, 6).unwrap();

    let mut individual: Vec<Decimal> = peers
        .iter()
        .map(|t| {
            let data = CompanyData::fetch(&provider, t, window.start, window.end).unwrap();
            beta::unlevered_beta(&data, &market, window.frequency, 6)
                .unwrap()
                .unlevered_beta
        })
        .collect();
    individual.sort();

    assert_eq!(summary.median_unlevered_beta, individual[1]);
    assert_eq!(summary.peers.len(), 3);
    assert!(summary.skipped.is_empty());
}

#[test]
fn test_unlevered_beta_below_levered_for_indebted_firm() {
    let specs = peer_specs();
    let provider = provider(&specs);
    let window = config(&["AAA"]).estimation_window().unwrap();
    let market = provider.price_history(INDEX, window.start, window.end).unwrap();
    let data = CompanyData::fetch(&provider, "CCC", window.start, window.end).unwrap();

    let b = beta::unlevered_beta(&data, &market, window.frequency, 6).unwrap();
    assert!((b.levered_beta - dec!(1.5)).abs() < dec!(0.001));
    assert!(b.unlevered_beta < b.levered_beta);
    let expected = b.levered_beta / (Decimal::ONE + (Decimal::ONE - b.tax_rate) * b.debt_to_equity);
    assert!((b.unlevered_beta - expected).abs() < dec!(0.0000001));
    assert_eq!(b.observations, common::MONTHS - 1);
}

#[test]
fn test_failed_peer_is_skipped_not_fatal() {
    let specs = peer_specs();
    let provider = provider(&specs);
    let window = config(&["AAA"]).estimation_window().unwrap();
    let market = provider.price_history(INDEX, window.start, window.end).unwrap();
    let peers = vec!["AAA".to_string(), "GHOST".to_string(), "CCC".to_string()];

    let summary = beta::median_unlevered_beta(&provider, &peers, &market, &window, 6).unwrap();
    assert_eq!(summary.peers.len(), 2);
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].ticker, "GHOST");
}

#[test]
fn test_all_peers_failing_is_insufficient_data() {
    let provider = provider(&[]);
    let window = config(&["AAA"]).estimation_window().unwrap();
    let market = provider.price_history(INDEX, window.start, window.end).unwrap();
    let peers = vec!["GHOST".to_string()];
    let err = beta::median_unlevered_beta(&provider, &peers, &market, &window, 6).unwrap_err();
    assert!(matches!(err, IntrinsicError::InsufficientData(_)));
}

// ===========================================================================
// LTGR tests
// ===========================================================================

#[test]
fn test_ltgr_from_fixture_statements() {
    let snapshot = company(&CompanySpec::new("LTG", dec!(1.0), dec!(500)));
    let provider = intrinsic_core::market_data::FixtureProvider::new().with_symbol("LTG", snapshot);
    let statements = provider.statements("LTG").unwrap();

    let out = growth::estimate_ltgr(&statements, &growth::LtgrParams::default()).unwrap();
    let summary = out.result;

    // NOPAT = 0.75 * 0.20 R, invested capital = 0.65 R
    assert!((summary.average_roic - dec!(0.15) / dec!(0.65)).abs() < dec!(0.000001));
    assert_eq!(summary.nopat_tax_rate, dec!(0.25));
    assert!(!summary.capped);
    assert!(summary.terminal_growth > Decimal::ZERO);
    assert!(summary.terminal_growth <= dec!(0.06));
    assert_eq!(summary.years.len(), 5);
}

#[test]
fn test_ltgr_missing_fixed_assets_is_missing_field() {
    let mut spec = CompanySpec::new("NPE", dec!(1.0), dec!(500));
    spec.drop_fixed_assets = true;
    let provider =
        intrinsic_core::market_data::FixtureProvider::new().with_symbol("NPE", company(&spec));
    let statements = provider.statements("NPE").unwrap();

    match growth::estimate_ltgr(&statements, &growth::LtgrParams::default()).unwrap_err() {
        IntrinsicError::MissingField { field, .. } => assert_eq!(field, "Net PPE"),
        e => panic!("Expected MissingField, got {e:?}"),
    }
}

// ===========================================================================
// DCF tests
// ===========================================================================

#[test]
fn test_dcf_reference_projection() {
    let input = dcf::DcfInput {
        base_revenue: dec!(1000),
        assumptions: dcf::Assumptions {
            revenue_growth: dec!(0.10),
            ebit_margin: dec!(0.20),
            capex_pct_revenue: dec!(0.05),
            depreciation_pct_revenue: dec!(0.05),
            working_capital_pct_revenue: dec!(0.10),
            tax_rate: dec!(0.25),
        },
        wacc: dec!(0.12),
        terminal_growth: dec!(0.04),
        forecast_years: 5,
        growth_fade: dec!(0.6),
        bridge: dcf::EquityBridge::default(),
        shares_outstanding: dec!(10),
    };
    let out = dcf::calculate_dcf(&input).unwrap();
    let r = &out.result;

    assert_eq!(r.forecast.len(), 5);
    // year 1: revenue 1100, FCFF = 0.15 * 1100 = 165, PV = 165 / 1.12
    assert_eq!(r.forecast[0].revenue, dec!(1100));
    assert_eq!(r.forecast[0].fcff, dec!(165));
    assert!((r.forecast[0].pv_fcff - dec!(147.3214285714)).abs() < dec!(0.0001));
    // year 2: revenue 1201.2, ΔWC = 10.12
    assert_eq!(r.forecast[1].revenue, dec!(1201.2));
    assert_eq!(r.forecast[1].delta_working_capital, dec!(10.12));

    assert!((r.firm_value - (r.pv_of_fcff + r.pv_of_terminal)).abs() < dec!(0.0000001));
    assert!(r.terminal_value_pct > dec!(0.5));
    assert_eq!(r.equity_value, r.firm_value);
    assert!((r.intrinsic_value_per_share - r.firm_value / dec!(10)).abs() < dec!(0.0000001));
}

#[test]
fn test_value_company_from_fixture() {
    let spec = CompanySpec::new("VAL", dec!(1.0), dec!(500));
    let provider =
        intrinsic_core::market_data::FixtureProvider::new().with_symbol("VAL", company(&spec));
    let window = config(&["VAL"]).estimation_window().unwrap();
    let data = CompanyData::fetch(&provider, "VAL", window.start, window.end).unwrap();

    let out =
        dcf::value_company(&data, dec!(0.11), dec!(0.04), &dcf::DcfParams::default()).unwrap();
    let v = &out.result;

    assert_eq!(v.history.years.len(), 5);
    assert!((v.assumptions.revenue_growth - dec!(0.08)).abs() < dec!(0.0000001));
    assert!((v.assumptions.ebit_margin - dec!(0.20)).abs() < dec!(0.0000001));
    assert_eq!(v.bridge.fiscal_year, Some(2025));
    assert_eq!(v.bridge.total_debt, dec!(500));
    assert_eq!(v.valuation.market_price_per_share, dec!(150));
    assert_eq!(
        v.valuation.recommendation,
        dcf::Recommendation::classify(v.valuation.intrinsic_value_per_share, dec!(150))
    );
    assert!(
        (v.valuation.intrinsic_value_per_share - v.dcf.equity_value / dec!(100)).abs()
            < dec!(0.0000001)
    );
}

#[test]
fn test_value_company_rejects_wacc_below_growth() {
    let spec = CompanySpec::new("VAL", dec!(1.0), dec!(500));
    let provider =
        intrinsic_core::market_data::FixtureProvider::new().with_symbol("VAL", company(&spec));
    let window = config(&["VAL"]).estimation_window().unwrap();
    let data = CompanyData::fetch(&provider, "VAL", window.start, window.end).unwrap();

    let err = dcf::value_company(&data, dec!(0.05), dec!(0.06), &dcf::DcfParams::default())
        .unwrap_err();
    assert!(matches!(err, IntrinsicError::InvalidTerminalValue(_)));
}

//! Well-known account codes in the normalized chart of accounts.
//!
//! The extraction pipeline maps raw statement captions onto these
//! codes before the engine ever sees them. Rule definitions reference
//! the codes, never the captions.

// ── Balance sheet: assets (1xxx) ────────────────────────────────────

pub const OPERATING_CASH: &str = "1010";
pub const MONEY_MARKET: &str = "1020";
pub const RESTRICTED_CASH: &str = "1050";
pub const TENANT_AR: &str = "1110";
pub const OTHER_RECEIVABLES: &str = "1120";
pub const TAX_ESCROW: &str = "1210";
pub const INSURANCE_ESCROW: &str = "1220";
pub const RESERVE_ESCROW: &str = "1230";
pub const PREPAID_INSURANCE: &str = "1310";
pub const PREPAID_OTHER: &str = "1320";
pub const LAND: &str = "1510";
pub const BUILDING: &str = "1520";
pub const ACCUM_DEPRECIATION: &str = "1530";
pub const CAPITAL_IMPROVEMENTS: &str = "1610";
pub const TOTAL_ASSETS: &str = "1999";

// ── Balance sheet: liabilities (2xxx) ───────────────────────────────

pub const ACCOUNTS_PAYABLE: &str = "2010";
pub const ACCRUED_INTEREST: &str = "2110";
pub const ACCRUED_PROPERTY_TAX: &str = "2120";
pub const SECURITY_DEPOSITS_HELD: &str = "2210";
pub const PREPAID_RENT_LIABILITY: &str = "2220";
pub const MORTGAGE_PAYABLE: &str = "2510";
pub const NOTES_PAYABLE: &str = "2520";
pub const TOTAL_LIABILITIES: &str = "2999";

// ── Balance sheet: equity (3xxx) ────────────────────────────────────

pub const CONTRIBUTED_CAPITAL: &str = "3010";
pub const RETAINED_EARNINGS: &str = "3110";
pub const CURRENT_YEAR_INCOME: &str = "3210";
pub const DISTRIBUTIONS: &str = "3310";
pub const TOTAL_EQUITY: &str = "3999";

// ── Income statement: revenue (4xxx) ────────────────────────────────

pub const RENTAL_INCOME: &str = "4010";
pub const TENANT_REIMBURSEMENTS: &str = "4020";
pub const PARKING_INCOME: &str = "4030";
pub const OTHER_INCOME: &str = "4040";
pub const LATE_FEES: &str = "4050";
pub const VACANCY_LOSS: &str = "4910";
pub const CONCESSIONS: &str = "4920";
pub const TOTAL_REVENUE: &str = "4999";

// ── Income statement: operating expenses (5xxx) ─────────────────────

pub const MANAGEMENT_FEES: &str = "5010";
pub const PAYROLL: &str = "5020";
pub const REPAIRS_MAINTENANCE: &str = "5030";
pub const TURNOVER: &str = "5040";
pub const UTILITIES_ELECTRIC: &str = "5050";
pub const UTILITIES_WATER: &str = "5060";
pub const UTILITIES_GAS: &str = "5070";
pub const PROPERTY_TAXES: &str = "5110";
pub const INSURANCE_EXPENSE: &str = "5120";
pub const MARKETING: &str = "5130";
pub const ADMINISTRATIVE: &str = "5140";
pub const PROFESSIONAL_FEES: &str = "5150";
pub const TOTAL_OPEX: &str = "5999";

// ── Income statement: NOI and below (6xxx-9xxx) ─────────────────────

pub const NET_OPERATING_INCOME: &str = "6100";
pub const INTEREST_EXPENSE: &str = "7010";
pub const DEPRECIATION: &str = "7020";
pub const AMORTIZATION: &str = "7030";
pub const CAPEX_IS: &str = "7110";
pub const NET_INCOME: &str = "9999";

// ── Cash flow statement ─────────────────────────────────────────────

pub const CF_BEGINNING_CASH: &str = "C100";
pub const CF_NET_INCOME: &str = "C110";
pub const CF_DEPRECIATION: &str = "C120";
pub const CF_AMORTIZATION: &str = "C130";
pub const CF_CHANGE_AR: &str = "C210";
pub const CF_CHANGE_AP: &str = "C220";
pub const CF_CHANGE_PREPAIDS: &str = "C230";
pub const CF_CHANGE_DEPOSITS: &str = "C240";
pub const CF_CHANGE_PREPAID_RENT: &str = "C250";
pub const CF_TAX_PAYMENTS: &str = "C310";
pub const CF_INSURANCE_PAYMENTS: &str = "C320";
pub const CF_ESCROW_TAX: &str = "C330";
pub const CF_ESCROW_INSURANCE: &str = "C340";
pub const CF_ESCROW_RESERVE: &str = "C350";
pub const CF_CAPEX: &str = "C410";
pub const CF_PRINCIPAL_PAYMENTS: &str = "C510";
pub const CF_INTEREST_PAID: &str = "C520";
pub const CF_DISTRIBUTIONS: &str = "C530";
pub const CF_CONTRIBUTIONS: &str = "C540";
pub const CF_NET_CHANGE: &str = "C800";
pub const CF_ENDING_CASH: &str = "C900";

// ── Rent roll aggregates ────────────────────────────────────────────

pub const RR_SCHEDULED_RENT: &str = "R100";
pub const RR_MARKET_RENT: &str = "R110";
pub const RR_CONCESSIONS: &str = "R120";
pub const RR_TOTAL_DEPOSITS: &str = "R200";
pub const RR_PREPAID_RENT: &str = "R210";
pub const RR_OCCUPIED_UNITS: &str = "R300";
pub const RR_TOTAL_UNITS: &str = "R310";
pub const RR_OCCUPIED_SQFT: &str = "R320";
pub const RR_TOTAL_SQFT: &str = "R330";
pub const RR_TENANT_AR: &str = "R400";
pub const RR_DELINQUENT_30: &str = "R410";
/// Per-tenant lines are prefixed `T-` followed by the unit number.
pub const RR_TENANT_PREFIX: &str = "T-";

// ── Mortgage statement ──────────────────────────────────────────────

pub const MS_PRINCIPAL_BALANCE: &str = "M100";
pub const MS_ORIGINAL_LOAN: &str = "M110";
pub const MS_TOTAL_ESCROW: &str = "M200";
pub const MS_TAX_ESCROW: &str = "M210";
pub const MS_INSURANCE_ESCROW: &str = "M220";
pub const MS_RESERVE_ESCROW: &str = "M230";
pub const MS_TOTAL_PAYMENT: &str = "M300";
pub const MS_PRINCIPAL_PORTION: &str = "M310";
pub const MS_INTEREST_PORTION: &str = "M320";
pub const MS_ESCROW_PORTION: &str = "M330";
pub const MS_YTD_PRINCIPAL: &str = "M400";
pub const MS_YTD_INTEREST: &str = "M410";
pub const MS_ACCRUED_INTEREST: &str = "M500";
pub const MS_APPRAISED_VALUE: &str = "M600";

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Common `{success, message?, data?}` envelope of the financial endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub strategy_data: Option<StrategyData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmData {
    #[serde(default)]
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub family_info: FamilyInfo,
    #[serde(default)]
    pub financial_info: FinancialInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub annual_income: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyInfo {
    #[serde(default)]
    pub spouse: bool,
    #[serde(default)]
    pub spouse_age: Option<u32>,
    #[serde(default)]
    pub spouse_income: Option<f64>,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub children_ages: Option<Vec<u32>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialInfo {
    #[serde(default)]
    pub savings: f64,
    #[serde(default)]
    pub investments: BTreeMap<String, f64>,
    #[serde(default)]
    pub debts: BTreeMap<String, f64>,
    #[serde(default)]
    pub monthly_expenses: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyData {
    #[serde(default)]
    pub advisor_type: String,
    #[serde(default)]
    pub customer_info: String,
    #[serde(default)]
    pub current_analysis: CurrentAnalysis,
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentAnalysis {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub issues: Vec<FinancialIssue>,
    #[serde(default)]
    pub portfolio: Vec<PortfolioItem>,
    #[serde(default)]
    pub total_amount: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinancialIssue {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioItem {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub details: Vec<String>,
    #[serde(default)]
    pub expected_results: Vec<String>,
    #[serde(default)]
    pub product_portfolio: Vec<ProductPortfolioItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPortfolioItem {
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub amount: String,
}

/// Response of `POST /financial/generate-lifeplan`.
#[derive(Debug, Clone, Deserialize)]
pub struct LifeplanResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub lifeplan_data: Option<LifeplanData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifeplanData {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub family_type: String,
    #[serde(default)]
    pub years_data: Vec<LifeplanYear>,
    #[serde(default)]
    pub chart_summary: Value,
    #[serde(default)]
    pub llm_analysis: Option<Value>,
    #[serde(default)]
    pub llm_lifeplan: Option<Value>,
    #[serde(default)]
    pub advisor_info: Option<Value>,
}

/// One projected year. Only the headline columns are typed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifeplanYear {
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub primary_age: u32,
    #[serde(default)]
    pub total_income: f64,
    #[serde(default)]
    pub total_expense: f64,
    #[serde(default)]
    pub annual_balance: f64,
    #[serde(default)]
    pub cash_balance: f64,
    #[serde(default)]
    pub special_events: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOption {
    pub id: String,
    pub title: String,
    pub description: String,
    pub content: String,
}

impl PromptOption {
    pub fn default_advisor() -> Self {
        Self {
            id: "default".to_string(),
            title: "標準アドバイザー".to_string(),
            description: "バランスの取れた金融アドバイスを提供".to_string(),
            content: "あなたは経験豊富なファイナンシャルアドバイザーです。顧客の状況に応じて適切な金融アドバイスを提供してください。".to_string(),
        }
    }
}

/// Raw prompt entry from `GET /api/prompts`; ids arrive as numbers or strings.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPrompt {
    pub id: Value,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PromptListResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub prompts: Option<Vec<RawPrompt>>,
}

impl From<RawPrompt> for PromptOption {
    fn from(raw: RawPrompt) -> Self {
        let id = match raw.id {
            Value::String(id) => id,
            other => other.to_string(),
        };
        Self {
            id,
            title: raw.title,
            description: raw
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "プロンプトの説明がありません".to_string()),
            content: raw.content,
        }
    }
}

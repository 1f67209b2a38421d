mod chat;
mod finance;

pub use chat::{normalize_history, ChatRequest, ClearResponse, Message, Role, StreamFrame};
pub use finance::{
    ApiEnvelope, CrmData, CurrentAnalysis, FamilyInfo, FinancialInfo, FinancialIssue,
    LifeplanData, LifeplanResponse, LifeplanYear, PersonalInfo, PortfolioItem,
    ProductPortfolioItem, PromptOption, Strategy, StrategyData,
};

pub(crate) use finance::PromptListResponse;

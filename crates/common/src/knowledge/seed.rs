//! Builtin financial knowledge base
//!
//! Asset ontology, core definitions, macro cause/effect chains, asset
//! properties and investor profiles. Loaded when no concept file is configured.

use super::concept::{Concept, ConceptKind, RelationType::*};

fn concept(id: &str, name: &str, category: &str, description: &str) -> Concept {
    Concept::new(id, ConceptKind::Concept)
        .named(name)
        .in_category(category)
        .describe(description)
}

fn entity(id: &str, name: &str, category: &str, description: &str) -> Concept {
    Concept::new(id, ConceptKind::Entity)
        .named(name)
        .in_category(category)
        .describe(description)
}

/// Concepts in declaration order; order is the ranking tie-breaker downstream.
pub fn financial_concepts() -> Vec<Concept> {
    vec![
        // Asset ontology
        concept("asset", "Asset", "investment", "Anything of value that can be owned and converted into cash.")
            .alias("assets")
            .relate(Includes, "financial_asset")
            .relate(Includes, "real_asset"),
        concept("financial_asset", "Financial Asset", "investment", "A non-physical asset whose value derives from a contractual claim.")
            .alias("financial assets")
            .relate(Includes, "equity")
            .relate(Includes, "fixed_income")
            .relate(Includes, "cryptocurrency")
            .relate(Includes, "derivative")
            .relate(Includes, "cash"),
        concept("real_asset", "Real Asset", "investment", "A physical asset with intrinsic value such as property or commodities.")
            .alias("real assets")
            .relate(Includes, "real_estate")
            .relate(Includes, "commodity"),
        concept("equity", "Equity", "investment", "Ownership interest in a company.")
            .alias("equities")
            .relate(Example, "stock")
            .relate(HasProperty, "high_growth_potential"),
        concept("fixed_income", "Fixed Income", "investment", "Investments that pay a defined stream of interest until maturity.")
            .relate(Example, "bond")
            .relate(HasProperty, "stable_income"),
        concept("stock", "Stock", "investment", "A share of ownership in a publicly traded company.")
            .alias("stocks")
            .alias("shares")
            .relate(HasType, "equity")
            .relate(HasProperty, "high_volatility")
            .relate(RelatedTo, "stock_market"),
        concept("bond", "Bond", "investment", "A debt security that pays periodic interest and returns principal at maturity.")
            .alias("bonds")
            .relate(HasType, "fixed_income")
            .relate(RelatedTo, "interest_rate")
            .relate(HasProperty, "low_volatility"),
        concept("mutual_fund", "Mutual Fund", "investment", "A pooled investment vehicle managed by professionals.")
            .alias("mutual funds")
            .relate(RelatedTo, "diversification"),
        concept("etf", "ETF", "investment", "An exchange-traded fund holding a basket of securities and trading like a stock.")
            .alias("etfs")
            .alias("exchange traded fund")
            .relate(RelatedTo, "diversification")
            .relate(RelatedTo, "market_index"),
        concept("cryptocurrency", "Cryptocurrency", "investment", "A digital asset secured by cryptography and recorded on a blockchain.")
            .alias("crypto")
            .alias("cryptocurrencies")
            .relate(HasProperty, "high_volatility")
            .relate(HasProperty, "high_growth_potential"),
        concept("derivative", "Derivative", "investment", "A contract whose value depends on an underlying asset.")
            .alias("derivatives")
            .alias("options")
            .alias("futures"),
        concept("cash", "Cash", "investment", "Currency and cash equivalents with immediate liquidity.")
            .relate(HasProperty, "capital_preservation"),
        concept("real_estate", "Real Estate", "investment", "Land and buildings held for use or investment.")
            .alias("property")
            .relate(RelatedTo, "interest_rate"),
        concept("commodity", "Commodity", "investment", "A raw material or primary good such as gold or oil.")
            .alias("commodities")
            .alias("gold"),
        // Macro economy
        concept("interest_rate", "Interest Rate", "banking", "The cost of borrowing money, expressed as a percentage of principal.")
            .alias("interest rates")
            .relate(SetBy, "central_bank")
            .relate(Affects, "inflation")
            .relate(Affects, "borrowing_cost"),
        concept("inflation", "Inflation", "market", "A general increase in prices and fall in the purchasing value of money.")
            .relate(Affects, "purchasing_power")
            .relate(Affects, "interest_rate"),
        concept("deflation", "Deflation", "market", "A general decrease in prices and increase in the purchasing value of money.")
            .relate(Affects, "purchasing_power"),
        concept("central_bank", "Central Bank", "banking", "The institution that sets monetary policy and benchmark interest rates.")
            .alias("central banks")
            .alias("federal reserve"),
        concept("borrowing_cost", "Borrowing Cost", "banking", "The total cost a borrower pays to use credit.")
            .alias("borrowing costs")
            .relate(Affects, "economic_growth"),
        concept("purchasing_power", "Purchasing Power", "personal_finance", "The quantity of goods a unit of money can buy."),
        concept("recession", "Recession", "market", "A significant decline in economic activity lasting months or longer.")
            .alias("recessions")
            .relate(Affects, "unemployment")
            .relate(Affects, "bear_market"),
        concept("economic_growth", "Economic Growth", "market", "An increase in the production of goods and services over time.")
            .relate(Affects, "bull_market"),
        concept("unemployment", "Unemployment", "market", "The share of the labour force without work."),
        // Market conditions
        concept("stock_market", "Stock Market", "market", "Venues where shares of public companies are bought and sold.")
            .alias("equity market")
            .relate(Includes, "market_index"),
        concept("market_index", "Market Index", "market", "A weighted basket of securities tracking a market segment.")
            .alias("market indices")
            .alias("index"),
        concept("bull_market", "Bull Market", "market", "A market in which share prices are rising, encouraging buying.")
            .alias("bull run"),
        concept("bear_market", "Bear Market", "market", "A market in which prices are falling, encouraging selling."),
        concept("volatility", "Volatility", "risk", "A statistical measure of the dispersion of returns for a given security or market index.")
            .alias("volatile"),
        concept("liquidity", "Liquidity", "risk", "The degree to which an asset can be quickly bought or sold without affecting its price."),
        concept("diversification", "Diversification", "risk", "The practice of spreading investments among different assets to reduce risk.")
            .alias("diversify"),
        concept("yield", "Yield", "investment", "The income returned on an investment, such as interest or dividends.")
            .alias("yields")
            .relate(RelatedTo, "bond"),
        // Asset properties
        concept("stable_income", "Stable Income", "risk", "Predictable periodic cash flow."),
        concept("low_volatility", "Low Volatility", "risk", "Prices that move within a narrow band."),
        concept("high_volatility", "High Volatility", "risk", "Prices that swing widely over short periods."),
        concept("high_growth_potential", "High Growth Potential", "risk", "Room for substantial long-term appreciation."),
        concept("capital_preservation", "Capital Preservation", "risk", "Priority on not losing the principal invested."),
        // Investor profiles
        concept("conservative_investor", "Conservative Investor", "risk", "An investor who prioritises capital preservation over returns.")
            .alias("conservative investors")
            .alias("risk averse")
            .relate(SuitableFor, "stable_income")
            .relate(SuitableFor, "low_volatility")
            .relate(SuitableFor, "capital_preservation"),
        concept("moderate_investor", "Moderate Investor", "risk", "An investor balancing growth against risk.")
            .alias("moderate investors")
            .relate(SuitableFor, "stable_income")
            .relate(SuitableFor, "high_growth_potential"),
        concept("aggressive_investor", "Aggressive Investor", "risk", "An investor seeking maximum growth and tolerating large swings.")
            .alias("aggressive investors")
            .relate(SuitableFor, "high_growth_potential")
            .relate(SuitableFor, "high_volatility"),
        // Personal finance
        concept("budgeting", "Budgeting", "personal_finance", "Planning income against spending over a period.")
            .alias("budget"),
        concept("savings", "Savings", "personal_finance", "Income set aside rather than spent.")
            .alias("savings account")
            .relate(RelatedTo, "interest_rate"),
        concept("debt", "Debt", "personal_finance", "Money owed to a lender.")
            .alias("loan")
            .alias("loans")
            .relate(RelatedTo, "interest_rate")
            .relate(RelatedTo, "borrowing_cost"),
        concept("credit_score", "Credit Score", "personal_finance", "A numeric summary of a borrower's creditworthiness.")
            .alias("credit scores")
            .relate(Affects, "borrowing_cost"),
        concept("retirement", "Retirement Planning", "personal_finance", "Saving and investing for income after leaving work.")
            .alias("retirement")
            .relate(RelatedTo, "diversification"),
        // Named instruments
        entity("bitcoin", "Bitcoin", "investment", "The first decentralised cryptocurrency, launched in 2009.")
            .alias("btc")
            .with_attribute("symbol", "BTC")
            .with_attribute("market", "crypto")
            .with_attribute("launched", 2009_i64)
            .relate(HasType, "cryptocurrency"),
        entity("ethereum", "Ethereum", "investment", "A programmable blockchain whose native asset is ether.")
            .alias("eth")
            .alias("ether")
            .with_attribute("symbol", "ETH")
            .with_attribute("market", "crypto")
            .with_attribute("launched", 2015_i64)
            .relate(HasType, "cryptocurrency"),
        entity("solana", "Solana", "investment", "A high-throughput layer 1 blockchain.")
            .alias("sol")
            .with_attribute("symbol", "SOL")
            .with_attribute("market", "crypto")
            .relate(HasType, "cryptocurrency"),
        entity("apple", "Apple", "investment", "Apple Inc., a consumer technology company listed on NASDAQ.")
            .alias("aapl")
            .alias("apple inc")
            .with_attribute("symbol", "AAPL")
            .with_attribute("market", "stock")
            .relate(HasType, "stock"),
        entity("sp500", "S&P 500", "market", "Index of 500 large US listed companies.")
            .alias("s&p")
            .with_attribute("symbol", "^GSPC")
            .with_attribute("market", "index")
            .relate(HasType, "market_index"),
    ]
}

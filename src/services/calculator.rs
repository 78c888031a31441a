//! Heat Pump Savings Calculator
//!
//! # Interview Q&A
//!
//! Q: 절감액은 어떻게 계산하는가?
//! A: 현재 난방비 → 유효 열량(kWh) → 히트펌프 전력 소비 → 비용
//!
//!    ```text
//!    delivered_kwh   = current_cost / price[type]
//!    heat_demand_kwh = delivered_kwh × efficiency[type]
//!    heat_pump_kwh   = heat_demand_kwh / SCOP
//!    heat_pump_cost  = heat_pump_kwh × ELECTRICITY_PRICE
//!    annual_savings  = current_cost − heat_pump_cost
//!    payback_years   = investment / annual_savings
//!    ```
//!
//! Q: 난방비를 모르는 사용자는?
//! A: 면적/천장 높이/거주 인원으로 열 수요를 추정한 뒤 역산
//!    `110 kWh/m² × (ceiling / 2.4) + 900 kWh × residents`
//!
//! Q: 상수는 어디서 관리하는가?
//! A: 이 모듈의 상수 테이블이 유일한 출처. 테스트가 값을 고정함

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============ Constants ============

/// 히트펌프 계절 성능 계수
pub const HEAT_PUMP_SCOP: f64 = 3.2;
/// 전기 단가 (kWh당)
pub const ELECTRICITY_PRICE_PER_KWH: f64 = 1.50;
/// 전력 kWh당 CO2 (kg)
pub const ELECTRICITY_CO2_KG_PER_KWH: f64 = 0.10;

/// 면적당 기준 열 수요 (kWh/m², 천장 2.4m 기준)
pub const BASE_DEMAND_KWH_PER_M2: f64 = 110.0;
pub const REFERENCE_CEILING_HEIGHT_M: f64 = 2.4;
/// 거주자 1인당 온수 수요 (kWh)
pub const HOT_WATER_KWH_PER_RESIDENT: f64 = 900.0;

/// 설치비 = 기본 + 체적(m³) × 단가
pub const BASE_INSTALLATION_COST: f64 = 25_000.0;
pub const INSTALLATION_COST_PER_M3: f64 = 60.0;

/// 현재 난방 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatingType {
    Electric,
    Oil,
    Gas,
    Wood,
    DistrictHeating,
}

/// 난방 방식별 상수
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatingProfile {
    /// 공급 에너지 kWh당 가격
    pub price_per_kwh: f64,
    /// 공급 에너지 → 유효 열 변환 효율
    pub efficiency: f64,
    /// 공급 에너지 kWh당 CO2 (kg)
    pub co2_kg_per_kwh: f64,
}

impl HeatingType {
    pub fn profile(self) -> HeatingProfile {
        let (price_per_kwh, efficiency, co2_kg_per_kwh) = match self {
            HeatingType::Electric => (1.50, 1.00, 0.10),
            HeatingType::Oil => (1.60, 0.80, 0.27),
            HeatingType::Gas => (1.20, 0.90, 0.20),
            HeatingType::Wood => (0.90, 0.70, 0.04),
            HeatingType::DistrictHeating => (1.10, 0.95, 0.08),
        };
        HeatingProfile {
            price_per_kwh,
            efficiency,
            co2_kg_per_kwh,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HeatingType::Electric => "electric",
            HeatingType::Oil => "oil",
            HeatingType::Gas => "gas",
            HeatingType::Wood => "wood",
            HeatingType::DistrictHeating => "district_heating",
        }
    }
}

impl FromStr for HeatingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "electric" => Ok(HeatingType::Electric),
            "oil" => Ok(HeatingType::Oil),
            "gas" => Ok(HeatingType::Gas),
            "wood" => Ok(HeatingType::Wood),
            "district_heating" => Ok(HeatingType::DistrictHeating),
            other => Err(format!("Unknown heating type: {}", other)),
        }
    }
}

impl fmt::Display for HeatingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 계산 입력 (주택 정보 + 현재 난방)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInput {
    pub square_meters: f64,
    pub ceiling_height: f64,
    pub residents: u32,
    pub current_heating_type: HeatingType,
    /// 연간 난방비 (없거나 0 이하면 추정)
    #[serde(default)]
    pub annual_heating_cost: Option<f64>,
}

/// 계산 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsResult {
    pub current_cost_annual: f64,
    pub heat_pump_cost_annual: f64,
    pub annual_savings: f64,
    /// 절감액이 0 이하면 회수 불가 → None
    pub payback_years: Option<f64>,
    pub savings_5_years: f64,
    pub savings_10_years: f64,
    /// 음수면 배출 증가
    pub co2_reduction_kg: f64,
    pub investment_cost: f64,
    pub heat_demand_kwh: f64,
    /// 난방비를 면적 기반으로 추정했는지
    pub cost_estimated: bool,
}

impl SavingsResult {
    /// formula 에서 참조할 수 있는 변수 이름
    pub const VARIABLE_NAMES: [&'static str; 9] = [
        "current_cost_annual",
        "heat_pump_cost_annual",
        "annual_savings",
        "savings_5_years",
        "savings_10_years",
        "co2_reduction_kg",
        "investment_cost",
        "heat_demand_kwh",
        "payback_years",
    ];

    /// shortcode/formula 변수로 노출되는 (이름, 값) 목록
    pub fn variables(&self) -> Vec<(&'static str, f64)> {
        let mut vars = vec![
            ("current_cost_annual", self.current_cost_annual),
            ("heat_pump_cost_annual", self.heat_pump_cost_annual),
            ("annual_savings", self.annual_savings),
            ("savings_5_years", self.savings_5_years),
            ("savings_10_years", self.savings_10_years),
            ("co2_reduction_kg", self.co2_reduction_kg),
            ("investment_cost", self.investment_cost),
            ("heat_demand_kwh", self.heat_demand_kwh),
        ];
        if let Some(payback) = self.payback_years {
            vars.push(("payback_years", payback));
        }
        vars
    }
}

/// 면적/천장/인원 기반 연간 열 수요 추정 (kWh)
pub fn estimate_heat_demand_kwh(square_meters: f64, ceiling_height: f64, residents: u32) -> f64 {
    BASE_DEMAND_KWH_PER_M2 * square_meters * (ceiling_height / REFERENCE_CEILING_HEIGHT_M)
        + HOT_WATER_KWH_PER_RESIDENT * f64::from(residents)
}

/// 설치비 추정
pub fn estimate_investment(square_meters: f64, ceiling_height: f64) -> f64 {
    BASE_INSTALLATION_COST + INSTALLATION_COST_PER_M3 * square_meters * ceiling_height
}

/// 히트펌프 절감액 계산 (순수 함수)
pub fn calculate_heat_pump_savings(input: &PropertyInput) -> SavingsResult {
    let profile = input.current_heating_type.profile();

    let (current_cost, heat_demand_kwh, cost_estimated) = match input.annual_heating_cost {
        Some(cost) if cost > 0.0 => {
            let delivered = cost / profile.price_per_kwh;
            (cost, delivered * profile.efficiency, false)
        }
        _ => {
            let demand =
                estimate_heat_demand_kwh(input.square_meters, input.ceiling_height, input.residents);
            let delivered = demand / profile.efficiency;
            (delivered * profile.price_per_kwh, demand, true)
        }
    };

    let delivered_kwh = current_cost / profile.price_per_kwh;
    let heat_pump_kwh = heat_demand_kwh / HEAT_PUMP_SCOP;
    let heat_pump_cost = heat_pump_kwh * ELECTRICITY_PRICE_PER_KWH;

    let annual_savings = current_cost - heat_pump_cost;
    let investment_cost = estimate_investment(input.square_meters, input.ceiling_height);
    let payback_years = (annual_savings > 0.0).then(|| investment_cost / annual_savings);

    let co2_reduction_kg = delivered_kwh * profile.co2_kg_per_kwh
        - heat_pump_kwh * ELECTRICITY_CO2_KG_PER_KWH;

    SavingsResult {
        current_cost_annual: round2(current_cost),
        heat_pump_cost_annual: round2(heat_pump_cost),
        annual_savings: round2(annual_savings),
        payback_years: payback_years.map(round2),
        savings_5_years: round2(annual_savings * 5.0),
        savings_10_years: round2(annual_savings * 10.0),
        co2_reduction_kg: round2(co2_reduction_kg),
        investment_cost: round2(investment_cost),
        heat_demand_kwh: round2(heat_demand_kwh),
        cost_estimated,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(heating: HeatingType, cost: Option<f64>) -> PropertyInput {
        PropertyInput {
            square_meters: 120.0,
            ceiling_height: 2.4,
            residents: 3,
            current_heating_type: heating,
            annual_heating_cost: cost,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.011
    }

    #[test]
    fn test_wood_2500() {
        let r = calculate_heat_pump_savings(&input(HeatingType::Wood, Some(2500.0)));

        // 2500 / 0.90 × 0.70 = 1944.44 kWh → / 3.2 × 1.50 = 911.46
        assert!(close(r.heat_demand_kwh, 1944.44));
        assert!(close(r.heat_pump_cost_annual, 911.46));
        assert!(close(r.annual_savings, r.current_cost_annual - r.heat_pump_cost_annual));
        assert!(close(r.annual_savings, 1588.54));

        // 25000 + 60 × 288 = 42280
        assert!(close(r.investment_cost, 42_280.0));
        let payback = r.payback_years.unwrap();
        assert!((payback - 42_280.0 / 1588.54).abs() < 0.02);
        assert!(!r.cost_estimated);
    }

    #[test]
    fn test_multi_year_savings_scale_linearly() {
        let r = calculate_heat_pump_savings(&input(HeatingType::Oil, Some(18_000.0)));
        assert!(close(r.savings_5_years, r.annual_savings * 5.0));
        assert!(close(r.savings_10_years, r.annual_savings * 10.0));
    }

    #[test]
    fn test_co2_from_consumption_delta() {
        let r = calculate_heat_pump_savings(&input(HeatingType::Oil, Some(16_000.0)));
        // 10000 kWh oil × 0.27 − (8000 / 3.2) kWh × 0.10
        assert!(close(r.co2_reduction_kg, 2700.0 - 250.0));
    }

    #[test]
    fn test_missing_cost_is_estimated() {
        let r = calculate_heat_pump_savings(&input(HeatingType::Electric, None));
        // 110 × 120 + 900 × 3 = 15900 kWh
        assert!(close(r.heat_demand_kwh, 15_900.0));
        assert!(close(r.current_cost_annual, 23_850.0));
        assert!(r.cost_estimated);

        let zero = calculate_heat_pump_savings(&input(HeatingType::Electric, Some(0.0)));
        assert_eq!(zero, r);
    }

    #[test]
    fn test_taller_ceiling_raises_demand() {
        let low = calculate_heat_pump_savings(&input(HeatingType::Gas, None));
        let mut tall = input(HeatingType::Gas, None);
        tall.ceiling_height = 3.0;
        let tall = calculate_heat_pump_savings(&tall);
        assert!(tall.heat_demand_kwh > low.heat_demand_kwh);
        assert!(tall.investment_cost > low.investment_cost);
    }

    #[test]
    fn test_deterministic() {
        let i = input(HeatingType::DistrictHeating, Some(9_000.0));
        assert_eq!(calculate_heat_pump_savings(&i), calculate_heat_pump_savings(&i));
    }

    #[test]
    fn test_heating_type_serde() {
        let t: HeatingType = serde_json::from_str("\"district_heating\"").unwrap();
        assert_eq!(t, HeatingType::DistrictHeating);
        assert_eq!("wood".parse::<HeatingType>().unwrap(), HeatingType::Wood);
        assert!("coal".parse::<HeatingType>().is_err());
    }

    #[test]
    fn test_variables_skip_missing_payback() {
        let mut r = calculate_heat_pump_savings(&input(HeatingType::Wood, Some(2500.0)));
        assert!(r.variables().iter().any(|(n, _)| *n == "payback_years"));
        r.payback_years = None;
        assert!(!r.variables().iter().any(|(n, _)| *n == "payback_years"));
    }
}

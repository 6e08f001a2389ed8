use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rating {
    pub agency: String,
    pub rating: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issuer {
    pub id: String,
    pub lei: String,
    pub name: String,
    pub short_name: String,
    pub aliases: Vec<String>,
    pub sector: String,
    pub country: String,
    pub ratings: Vec<Rating>,
}

impl Issuer {
    pub fn rating_by(&self, agency: &str) -> Option<&str> {
        self.ratings
            .iter()
            .find(|r| r.agency == agency)
            .map(|r| r.rating.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Alias,
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssuerMatch<'a> {
    pub issuer: &'a Issuer,
    pub score: f64,
    pub match_type: MatchType,
}

/// Score every issuer against `query`, best matches first.
///
/// Short name 1.0, legal name 0.95, alias 0.9, substring of any of those 0.7.
pub fn search<'a>(issuers: &'a [Issuer], query: &str) -> Vec<IssuerMatch<'a>> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    let mut matches: Vec<IssuerMatch<'a>> = issuers
        .iter()
        .filter_map(|issuer| {
            let short = issuer.short_name.to_lowercase();
            let name = issuer.name.to_lowercase();
            let aliases: Vec<String> = issuer.aliases.iter().map(|a| a.to_lowercase()).collect();

            let (score, match_type) = if short == query {
                (1.0, MatchType::Exact)
            } else if name == query {
                (0.95, MatchType::Exact)
            } else if aliases.iter().any(|a| *a == query) {
                (0.9, MatchType::Alias)
            } else if short.contains(&query)
                || name.contains(&query)
                || aliases.iter().any(|a| a.contains(&query))
            {
                (0.7, MatchType::Fuzzy)
            } else {
                return None;
            };
            Some(IssuerMatch { issuer, score, match_type })
        })
        .collect();

    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches
}

#[allow(clippy::too_many_arguments)]
fn issuer(
    id: &str,
    lei: &str,
    name: &str,
    short_name: &str,
    aliases: &[&str],
    sector: &str,
    country: &str,
    ratings: &[(&str, &str)],
) -> Issuer {
    Issuer {
        id: id.to_string(),
        lei: lei.to_string(),
        name: name.to_string(),
        short_name: short_name.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        sector: sector.to_string(),
        country: country.to_string(),
        ratings: ratings
            .iter()
            .map(|(agency, rating)| Rating {
                agency: agency.to_string(),
                rating: rating.to_string(),
            })
            .collect(),
    }
}

pub(super) fn seed() -> Vec<Issuer> {
    const SP: &str = "S&P";
    const MOODYS: &str = "Moody's";
    const FITCH: &str = "Fitch";

    vec![
        issuer("bmw-ag", "5299006WR3LK4LFVJG62", "Bayerische Motoren Werke Aktiengesellschaft", "BMW AG",
            &["BMW", "BMW Group", "Bayerische Motoren Werke"], "Automobiles", "Germany",
            &[(SP, "A"), (MOODYS, "A2"), (FITCH, "A")]),
        issuer("volkswagen-ag", "529900R8Z2H4L8W9NH85", "Volkswagen Aktiengesellschaft", "Volkswagen AG",
            &["VW", "Volkswagen", "VW Group"], "Automobiles", "Germany",
            &[(SP, "BBB+"), (MOODYS, "A3"), (FITCH, "BBB+")]),
        issuer("mercedes-benz-ag", "529900R27DL06UVNT076", "Mercedes-Benz Group AG", "Mercedes-Benz",
            &["Mercedes", "Daimler", "Mercedes-Benz Group", "Daimler AG"], "Automobiles", "Germany",
            &[(SP, "A"), (MOODYS, "A2"), (FITCH, "A-")]),
        issuer("porsche-ag", "529900P3G9Z4YYDQQ854", "Dr. Ing. h.c. F. Porsche AG", "Porsche AG",
            &["Porsche", "Porsche Automobil"], "Automobiles", "Germany",
            &[(SP, "A-"), (MOODYS, "A3")]),
        issuer("audi-ag", "529900G2YW1GHYF3BT23", "AUDI Aktiengesellschaft", "Audi AG",
            &["Audi", "Audi Group"], "Automobiles", "Germany",
            &[(SP, "BBB+"), (MOODYS, "A3")]),
        issuer("siemens-ag", "529900DR2VXHGXZC1A23", "Siemens Aktiengesellschaft", "Siemens AG",
            &["Siemens", "Siemens Group"], "Industrials", "Germany",
            &[(SP, "A+"), (MOODYS, "A1"), (FITCH, "A+")]),
        issuer("basf-se", "529900PM64WH8AF1E917", "BASF SE", "BASF",
            &["BASF", "BASF SE"], "Chemicals", "Germany",
            &[(SP, "A"), (MOODYS, "A2")]),
        issuer("totalenergies-se", "529900S21EQ7XV0JVV45", "TotalEnergies SE", "TotalEnergies",
            &["Total", "TotalEnergies", "Total SA"], "Energy", "France",
            &[(SP, "AA-"), (MOODYS, "Aa3"), (FITCH, "AA-")]),
        issuer("shell-plc", "21380068P1DRHMJ8KU70", "Shell plc", "Shell",
            &["Shell", "Royal Dutch Shell"], "Energy", "United Kingdom",
            &[(SP, "AA-"), (MOODYS, "Aa3")]),
        issuer("lvmh-se", "IOG4E947OATN0K7VS2V9", "LVMH Moët Hennessy Louis Vuitton SE", "LVMH",
            &["LVMH", "Louis Vuitton", "Moet Hennessy"], "Consumer Goods", "France",
            &[(SP, "A+"), (MOODYS, "A1")]),
    ]
}

use indexmap::IndexMap;
use serde::Serialize;
use snapshot::{OracleId, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketKind {
    Spot,
    Perp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleMember {
    pub kind: MarketKind,
    pub market_index: u16,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleGroup {
    pub oracle_id: OracleId,
    pub members: Vec<OracleMember>,
}

impl OracleGroup {
    pub fn label(&self) -> String {
        self.members
            .iter()
            .map(|member| member.name.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

/// Active positions bucketed by the price feed they read, perps first, in
/// first-seen order. One price control is shown per bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OracleGroups {
    groups: IndexMap<OracleId, Vec<OracleMember>>,
    max_spot_decimals: u32,
}

impl OracleGroups {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut out = Self::default();

        for position in snapshot.active_perp_positions() {
            let Some(market) = snapshot.perp_market(position.market_index) else {
                continue;
            };
            out.push(
                market.oracle_id(),
                OracleMember {
                    kind: MarketKind::Perp,
                    market_index: position.market_index,
                    name: market.name(),
                },
            );
        }

        for position in snapshot.active_spot_positions() {
            let Some(market) = snapshot.spot_market(position.market_index) else {
                continue;
            };
            out.push(
                market.oracle_id(),
                OracleMember {
                    kind: MarketKind::Spot,
                    market_index: position.market_index,
                    name: market.name(),
                },
            );
            out.max_spot_decimals = out.max_spot_decimals.max(market.decimals);
        }

        out
    }

    fn push(&mut self, oracle_id: OracleId, member: OracleMember) {
        self.groups.entry(oracle_id).or_default().push(member);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn max_spot_decimals(&self) -> u32 {
        self.max_spot_decimals
    }

    pub fn get(&self, oracle_id: &OracleId) -> Option<&[OracleMember]> {
        self.groups.get(oracle_id).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = OracleGroup> + '_ {
        self.groups.iter().map(|(oracle_id, members)| OracleGroup {
            oracle_id: oracle_id.clone(),
            members: members.clone(),
        })
    }
}

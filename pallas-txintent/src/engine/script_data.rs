use pallas_codec::minicbor::{self, Encode};
use pallas_crypto::hash::{Hash, Hasher};
use pallas_primitives::conway::{CostModel, PlutusData, Redeemers};

use crate::{error::encoding_error, model::ScriptKind, TxBuilderError};

/// Cost models of the plutus languages used by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LanguageViews(Vec<(ScriptKind, CostModel)>);

impl LanguageViews {
    /// Entries come out in canonical key order: the single-byte keys of V2 and
    /// V3 first, then the byte-string key of V1.
    pub fn new(views: impl IntoIterator<Item = (ScriptKind, CostModel)>) -> Self {
        let mut views: Vec<_> = views
            .into_iter()
            .filter(|(kind, _)| kind.is_plutus())
            .collect();

        views.sort_by_key(|(kind, _)| canonical_rank(*kind));
        views.dedup_by_key(|(kind, _)| *kind);

        Self(views)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn canonical_rank(kind: ScriptKind) -> u8 {
    match kind {
        ScriptKind::PlutusV2 => 0,
        ScriptKind::PlutusV3 => 1,
        ScriptKind::PlutusV1 => 2,
        ScriptKind::Native => 3,
    }
}

impl<C> Encode<C> for LanguageViews {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.map(self.0.len() as u64)?;

        for (kind, model) in self.0.iter() {
            match kind {
                // V1 keeps the historical encoding: the language id and the
                // indefinite array of costs are both wrapped in byte strings.
                ScriptKind::PlutusV1 => {
                    let mut sub = minicbor::Encoder::new(Vec::new());

                    sub.begin_array()
                        .and_then(|x| {
                            for cost in model.iter() {
                                x.encode_with(cost, ctx)?;
                            }
                            x.end()
                        })
                        .map_err(|_| minicbor::encode::Error::message("invalid cost model"))?;

                    e.bytes(&[0x00])?;
                    e.bytes(&sub.into_writer())?;
                }
                _ => {
                    e.u8(kind.tag() - 1)?;
                    e.encode(model)?;
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptData {
    /// `None` when the transaction carries datums but no redeemers.
    pub redeemers: Option<Redeemers>,
    pub datums: Option<Vec<PlutusData>>,
    pub language_views: LanguageViews,
}

impl ScriptData {
    pub fn hash(&self) -> Result<Hash<32>, TxBuilderError> {
        let mut buf = vec![];

        match &self.redeemers {
            Some(redeemers) => minicbor::encode(redeemers, &mut buf).map_err(encoding_error)?,
            None => buf.push(0xa0),
        }

        if let Some(datums) = &self.datums {
            minicbor::encode(datums, &mut buf).map_err(encoding_error)?;
        }

        if self.redeemers.is_some() {
            minicbor::encode(&self.language_views, &mut buf).map_err(encoding_error)?;
        } else {
            buf.push(0xa0);
        }

        Ok(Hasher::<256>::hash(&buf))
    }
}

#[cfg(test)]
mod tests {
    use pallas_codec::utils::MaybeIndefArray;

    use super::*;

    #[test]
    fn language_views_follow_canonical_order() {
        let views = LanguageViews::new([
            (ScriptKind::PlutusV1, vec![1]),
            (ScriptKind::PlutusV3, vec![3]),
            (ScriptKind::PlutusV2, vec![2]),
        ]);

        let bytes = minicbor::to_vec(&views).unwrap();

        // {1: [2], 2: [3], h'00': h'9f01ff'}
        assert_eq!(
            hex::encode(bytes),
            "a30181020281034100439f01ff"
        );
    }

    #[test]
    fn datums_without_redeemers_use_empty_maps() {
        let datum = PlutusData::BigInt(pallas_primitives::conway::BigInt::Int(1.into()));

        let data = ScriptData {
            redeemers: None,
            datums: Some(vec![datum]),
            language_views: LanguageViews::new([]),
        };

        let expected = Hasher::<256>::hash(&hex::decode("a08101a0").unwrap());
        assert_eq!(data.hash().unwrap(), expected);
    }

    #[test]
    fn hash_changes_with_cost_models() {
        let redeemers = Redeemers::List(MaybeIndefArray::Def(vec![]));

        let a = ScriptData {
            redeemers: Some(redeemers.clone()),
            datums: None,
            language_views: LanguageViews::new([(ScriptKind::PlutusV2, vec![1, 2])]),
        };

        let b = ScriptData {
            redeemers: Some(redeemers),
            datums: None,
            language_views: LanguageViews::new([(ScriptKind::PlutusV2, vec![1, 3])]),
        };

        assert_ne!(a.hash().unwrap(), b.hash().unwrap());
    }
}

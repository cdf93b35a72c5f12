//! # Identity Service
//!
//! Party allocation and the fingerprint ↔ party mapping contract.

use crate::domain::{FingerprintMapping, IdentityConfig, IdentityError, IdentityResult};
use crate::ports::IdentityApi;
use async_trait::async_trait;
use cb_01_ledger_session::{
    Command, LedgerSession, PartyDetails, Signature, SignatureFormat, Signer, SigningAlgorithm,
    UserRight,
};
use shared_types::{fingerprint_from_evm_address, normalize_fingerprint, PartyId, User};
use std::sync::Arc;
use tracing::{debug, info};

/// Identity component.
pub struct IdentityService {
    session: Arc<LedgerSession>,
    config: IdentityConfig,
}

impl IdentityService {
    /// Create the service; fails on incomplete configuration.
    pub fn new(session: Arc<LedgerSession>, config: IdentityConfig) -> IdentityResult<Self> {
        config.validate()?;
        Ok(Self { session, config })
    }

    /// Service configuration.
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// All active mappings visible to the issuer.
    pub async fn list_fingerprint_mappings(&self) -> IdentityResult<Vec<FingerprintMapping>> {
        let contracts = self
            .session
            .get_active_contracts(
                std::slice::from_ref(&self.config.issuer_party),
                &self.config.mapping_template(),
            )
            .await?;
        Ok(contracts.iter().map(FingerprintMapping::from_created).collect())
    }

    fn party_hint(fingerprint: &str) -> String {
        let hex = fingerprint.trim_start_matches("0x");
        format!("user-{}", &hex[..hex.len().min(16)])
    }
}

#[async_trait]
impl IdentityApi for IdentityService {
    async fn allocate_party(&self, hint: &str) -> IdentityResult<PartyDetails> {
        let details = self.session.allocate_party(hint).await?;
        info!(party = %details.party, "[cb-02] Party allocated");
        Ok(details)
    }

    async fn allocate_external_party(
        &self,
        hint: &str,
        public_key_spki_der: &[u8],
        signer: &dyn Signer,
    ) -> IdentityResult<PartyId> {
        let topology = self
            .session
            .generate_external_party_topology(hint, public_key_spki_der)
            .await?;
        debug!(
            party = %topology.party_id,
            key = %topology.public_key_fingerprint,
            "[cb-02] External party topology generated"
        );

        let signature = Signature {
            format: SignatureFormat::Der,
            signature: signer.sign_der(&topology.multi_hash).await?,
            signed_by: signer.fingerprint(),
            signing_algorithm_spec: SigningAlgorithm::EcDsaSha256,
        };
        let party = self
            .session
            .allocate_external_party(&topology, &signature)
            .await?;
        info!(party = %party, "[cb-02] External party allocated");
        Ok(party)
    }

    async fn create_fingerprint_mapping(
        &self,
        user_party: &str,
        fingerprint: &str,
        evm_address: &str,
    ) -> IdentityResult<FingerprintMapping> {
        let fingerprint = normalize_fingerprint(fingerprint);
        let template = self.config.mapping_template();
        let arguments = FingerprintMapping::create_arguments(
            &self.config.issuer_party,
            user_party,
            &fingerprint,
            evm_address,
        );
        let commands = self.session.commands(
            std::slice::from_ref(&self.config.issuer_party),
            vec![Command::create(template.clone(), arguments)],
        );
        let tx = self.session.submit_and_wait_for_transaction(&commands).await?;

        let created = tx
            .find_created(&template)
            .ok_or_else(|| IdentityError::MappingNotCreated(fingerprint.clone()))?;
        let mapping = FingerprintMapping::from_created(created);
        info!(
            fingerprint = %mapping.fingerprint,
            party = %mapping.user_party,
            contract_id = %mapping.contract_id,
            "[cb-02] Fingerprint mapping created"
        );
        Ok(mapping)
    }

    async fn get_fingerprint_mapping(
        &self,
        fingerprint: &str,
    ) -> IdentityResult<FingerprintMapping> {
        let wanted = normalize_fingerprint(fingerprint);
        self.list_fingerprint_mappings()
            .await?
            .into_iter()
            .find(|m| normalize_fingerprint(&m.fingerprint) == wanted)
            .ok_or(IdentityError::MappingNotFound(wanted))
    }

    async fn grant_act_as_party(&self, party: &str) -> IdentityResult<()> {
        match self
            .session
            .grant_user_rights(&[UserRight::CanActAs(party.to_string())])
            .await
        {
            Ok(()) => {
                info!(party, "[cb-02] Granted act-as right");
                Ok(())
            }
            Err(err) if err.is_already_exists() => {
                debug!(party, "[cb-02] Act-as right already granted");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn register_user(&self, evm_address: &str) -> IdentityResult<User> {
        let fingerprint = fingerprint_from_evm_address(evm_address)
            .ok_or_else(|| IdentityError::InvalidAddress(evm_address.to_string()))?;

        let mapping = match self.get_fingerprint_mapping(&fingerprint).await {
            Ok(existing) => {
                debug!(fingerprint = %fingerprint, "[cb-02] User already registered");
                existing
            }
            Err(IdentityError::MappingNotFound(_)) => {
                let party = self.allocate_party(&Self::party_hint(&fingerprint)).await?;
                self.grant_act_as_party(&party.party).await?;
                self.create_fingerprint_mapping(&party.party, &fingerprint, evm_address)
                    .await?
            }
            Err(err) => return Err(err),
        };

        Ok(User {
            evm_address: evm_address.to_string(),
            fingerprint: mapping.fingerprint,
            party_id: Some(mapping.user_party),
            mapping_cid: Some(mapping.contract_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cb_01_ledger_session::test_utils::MockLedger;
    use cb_01_ledger_session::{LedgerConfig, Secp256k1Signer};

    const ISSUER: &str = "relayer::1220";

    fn service() -> (Arc<MockLedger>, IdentityService) {
        let ledger = Arc::new(MockLedger::new());
        let session = Arc::new(LedgerSession::new(
            LedgerConfig::default(),
            ledger.clone(),
            None,
        ));
        let config = IdentityConfig {
            package_id: "#common".into(),
            issuer_party: ISSUER.into(),
        };
        (ledger, IdentityService::new(session, config).unwrap())
    }

    #[test]
    fn test_config_validation() {
        let ledger = Arc::new(MockLedger::new());
        let session = Arc::new(LedgerSession::new(LedgerConfig::default(), ledger, None));
        assert!(matches!(
            IdentityService::new(session, IdentityConfig::default()),
            Err(IdentityError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_mapping_lookup_normalizes_fingerprint() {
        let (_, identity) = service();
        let created = identity
            .create_fingerprint_mapping("alice::1220", "ABCDEF", "0x01")
            .await
            .unwrap();
        assert_eq!(created.fingerprint, "0xabcdef");
        assert_eq!(created.issuer, ISSUER);

        let found = identity.get_fingerprint_mapping("0xAbCdEf").await.unwrap();
        assert_eq!(found.contract_id, created.contract_id);
        assert_eq!(found.user_party, "alice::1220");
    }

    #[tokio::test]
    async fn test_mapping_not_found() {
        let (_, identity) = service();
        identity
            .create_fingerprint_mapping("alice::1220", "0xaa", "0x01")
            .await
            .unwrap();
        assert!(matches!(
            identity.get_fingerprint_mapping("0xbb").await,
            Err(IdentityError::MappingNotFound(fp)) if fp == "0xbb"
        ));
    }

    #[tokio::test]
    async fn test_grant_act_as_is_idempotent() {
        let (_, identity) = service();
        tokio_test::assert_ok!(identity.grant_act_as_party("alice::1220").await);
        tokio_test::assert_ok!(identity.grant_act_as_party("alice::1220").await);
    }

    #[tokio::test]
    async fn test_external_party_allocation_signs_multi_hash() {
        let (_, identity) = service();
        let signer = Secp256k1Signer::generate().unwrap();
        let party = identity
            .allocate_external_party("ext", signer.public_key_der(), &signer)
            .await
            .unwrap();
        assert!(party.starts_with("ext::1220"));
    }

    #[tokio::test]
    async fn test_register_user_is_idempotent() {
        let (ledger, identity) = service();
        let address = "0x52908400098527886E0F7030069857D2E4169EE7";

        let first = identity.register_user(address).await.unwrap();
        let second = identity.register_user(address).await.unwrap();
        assert!(first.is_registered());
        assert_eq!(first, second);
        assert_eq!(
            ledger.active(&identity.config().mapping_template()).len(),
            1
        );

        assert!(matches!(
            identity.register_user("0x1234").await,
            Err(IdentityError::InvalidAddress(_))
        ));
    }
}

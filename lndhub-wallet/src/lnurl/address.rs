use std::{fmt, str::FromStr};

use url::Url;

use super::error::LnurlError;

/// A `user@domain` lightning address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LightningAddress {
    pub user: String,
    pub domain: String,
}

impl LightningAddress {
    /// `https://{domain}/.well-known/lnurlp/{user}`
    pub fn lnurlp_url(&self) -> Result<Url, LnurlError> {
        let malformed = || LnurlError::MalformedAddress(self.to_string());

        let mut url = Url::parse(&format!("https://{}/", self.domain)).map_err(|_| malformed())?;
        // the domain must not smuggle in a path, query or fragment
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(malformed());
        }

        url.path_segments_mut()
            .map_err(|_| malformed())?
            .pop_if_empty()
            .extend([".well-known", "lnurlp", self.user.as_str()]);
        Ok(url)
    }
}

impl FromStr for LightningAddress {
    type Err = LnurlError;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        match address.split('@').collect::<Vec<_>>()[..] {
            [user, domain] => Ok(Self {
                user: user.to_owned(),
                domain: domain.to_owned(),
            }),
            _ => Err(LnurlError::MalformedAddress(address.to_owned())),
        }
    }
}

impl fmt::Display for LightningAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() -> anyhow::Result<()> {
        let address = LightningAddress::from_str("alice@example.com")?;
        assert_eq!(address.user, "alice");
        assert_eq!(address.domain, "example.com");
        assert_eq!(address.to_string(), "alice@example.com");
        Ok(())
    }

    #[test]
    fn test_parse_requires_exactly_one_separator() {
        for input in ["", "alice", "example.com", "a@b@c", "@@", "alice@@example.com"] {
            match LightningAddress::from_str(input) {
                Err(LnurlError::MalformedAddress(offending)) => assert_eq!(offending, input),
                other => panic!("{input} should be malformed, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_roundtrips_single_separator() -> anyhow::Result<()> {
        for input in ["alice@example.com", "@example.com", "alice@", "@", "a.b+c@sub.domain.io"] {
            let address = LightningAddress::from_str(input)?;
            assert_eq!(format!("{}@{}", address.user, address.domain), input);
        }
        Ok(())
    }

    #[test]
    fn test_lnurlp_url() -> anyhow::Result<()> {
        let url = LightningAddress::from_str("alice@example.com")?.lnurlp_url()?;
        assert_eq!(url.as_str(), "https://example.com/.well-known/lnurlp/alice");

        let url = LightningAddress::from_str("bob@localhost:8080")?.lnurlp_url()?;
        assert_eq!(url.as_str(), "https://localhost:8080/.well-known/lnurlp/bob");
        Ok(())
    }

    #[test]
    fn test_lnurlp_url_rejects_bad_domains() -> anyhow::Result<()> {
        for input in ["alice@", "alice@example.com/evil", "alice@example.com?x=1", "alice@exa mple.com"] {
            let address = LightningAddress::from_str(input)?;
            assert!(
                matches!(address.lnurlp_url(), Err(LnurlError::MalformedAddress(_))),
                "{input} should be rejected"
            );
        }
        Ok(())
    }

    #[test]
    fn test_lnurlp_url_encodes_user() -> anyhow::Result<()> {
        let url = LightningAddress::from_str("a/b@example.com")?.lnurlp_url()?;
        assert_eq!(url.as_str(), "https://example.com/.well-known/lnurlp/a%2Fb");
        Ok(())
    }
}

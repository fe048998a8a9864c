use std::time::Duration;

/// Secrets and TTLs for the two JWT signing domains.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub s3: S3Config,
    pub redis_url: Option<String>,
}

const MIN_SECRET_LEN: usize = 32;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let secret = std::env::var("JWT_SECRET")?;
        let refresh_secret = std::env::var("JWT_REFRESH_SECRET")?;
        if secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }
        if refresh_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_REFRESH_SECRET must be at least {MIN_SECRET_LEN} bytes");
        }

        let access_ttl = parse_expiry(
            &std::env::var("JWT_ACCESS_EXPIRES").unwrap_or_else(|_| "15m".into()),
        )?;
        let refresh_ttl = parse_expiry(
            &std::env::var("JWT_REFRESH_EXPIRES").unwrap_or_else(|_| "7d".into()),
        )?;

        let s3 = S3Config {
            endpoint: std::env::var("S3_ENDPOINT")?,
            bucket: std::env::var("S3_BUCKET")?,
            access_key: std::env::var("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };

        Ok(Self {
            database_url,
            jwt: JwtConfig {
                secret,
                refresh_secret,
                access_ttl,
                refresh_ttl,
            },
            s3,
            redis_url: std::env::var("REDIS_URL").ok(),
        })
    }
}

/// Parse a duration string like "15m", "7d", "12h", "30s". A bare number is
/// taken as seconds.
pub fn parse_expiry(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("empty duration");
    }
    let (value, unit) = match s.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&s[..s.len() - 1], Some(c)),
        _ => (s, None),
    };
    let n: u64 = value
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid duration: {s}"))?;
    let secs = match unit {
        None | Some('s') => n,
        Some('m') => n * 60,
        Some('h') => n * 3600,
        Some('d') => n * 86400,
        Some(u) => anyhow::bail!("unknown duration unit '{u}' in {s}"),
    };
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minutes_hours_days() {
        assert_eq!(parse_expiry("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_expiry("12h").unwrap(), Duration::from_secs(43_200));
        assert_eq!(parse_expiry("7d").unwrap(), Duration::from_secs(604_800));
    }

    #[test]
    fn parses_seconds_and_bare_numbers() {
        assert_eq!(parse_expiry("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_expiry("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_expiry("").is_err());
        assert!(parse_expiry("soon").is_err());
        assert!(parse_expiry("7w").is_err());
    }
}

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

/// Generate a random alphanumeric secret of the given length
pub fn create_random_secret(secret_len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(secret_len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generates_secret_of_given_length() {
        for len in &[0, 1, 16, 64] {
            let secret = create_random_secret(*len);
            assert_eq!(secret.len(), *len);
            assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn generates_distinct_secrets() {
        assert_ne!(create_random_secret(32), create_random_secret(32));
    }
}

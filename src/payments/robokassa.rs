//! Signature generation and verification for the external acquirer
//! callback. Grounded on `original_source/app/utils/robokassa.py`:
//! request signatures are taken over `MerchantLogin:OutSum:InvId:Password1:Shp_*`
//! (what the user's browser is redirected with), callback signatures are
//! verified over `OutSum:InvId:Password2:Shp_*` — the original never
//! includes `MerchantLogin` on the verification side, only on the
//! outbound redirect. Both orderings use Shp fields sorted
//! lexicographically by key, as the acquirer requires. `InvId` is an
//! opaque string there, not a numeric sequence — the original passes the
//! same value it also carries in `Shp_payment_id`, so here it is the
//! Payment's UUID rendered as a string.

use std::collections::BTreeMap;

use md5::{Digest, Md5};

pub fn generate_request_signature(
    merchant_login: &str,
    out_sum: &str,
    inv_id: &str,
    password_1: &str,
    shp: &BTreeMap<String, String>,
) -> String {
    let mut input = format!("{merchant_login}:{out_sum}:{inv_id}:{password_1}");
    append_shp(&mut input, shp);
    hex_upper_md5(&input)
}

pub fn verify_callback_signature(
    out_sum: &str,
    inv_id: &str,
    password_2: &str,
    shp: &BTreeMap<String, String>,
    provided_signature: &str,
) -> bool {
    let mut input = format!("{out_sum}:{inv_id}:{password_2}");
    append_shp(&mut input, shp);
    let expected = hex_upper_md5(&input);
    expected.eq_ignore_ascii_case(provided_signature)
}

pub fn success_reply(inv_id: &str) -> String {
    format!("OK{inv_id}\n")
}

fn append_shp(input: &mut String, shp: &BTreeMap<String, String>) {
    for (key, value) in shp {
        input.push(':');
        input.push_str(key);
        input.push('=');
        input.push_str(value);
    }
}

fn hex_upper_md5(input: &str) -> String {
    let digest = Md5::digest(input.as_bytes());
    hex::encode_upper(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_with_matching_passwords() {
        let mut shp = BTreeMap::new();
        shp.insert("Shp_payment_id".to_string(), "abc-123".to_string());

        let input = "100.00:42:secret2:Shp_payment_id=abc-123".to_string();
        let sig = hex_upper_md5(&input);

        assert!(verify_callback_signature("100.00", "42", "secret2", &shp, &sig));
        assert!(!verify_callback_signature("100.00", "42", "wrong", &shp, &sig));
    }

    #[test]
    fn rejects_tampered_amount() {
        let shp = BTreeMap::new();
        let sig = generate_request_signature("shop", "100.00", "42", "pw1", &shp);
        assert!(!verify_callback_signature("999.00", "42", "pw1", &shp, &sig));
    }

    #[test]
    fn success_reply_format() {
        assert_eq!(success_reply("42"), "OK42\n");
    }
}

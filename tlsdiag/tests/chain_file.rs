//! Reading certificate bundles from disk

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

mod common;

use chrono::{Datelike, Timelike};
use common::TestIdentity;
use proptest::prelude::*;
use rcgen::{CertificateParams, KeyPair, date_time_ymd};
use std::io::Write;
use tempfile::NamedTempFile;
use tlsdiag::{ErrorCode, ParseError, chain};

fn self_signed(cn_host: &str) -> String {
    rcgen::generate_simple_self_signed(vec![cn_host.to_string()]).unwrap().cert.pem()
}

fn write_bundle(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_bundle_keeps_file_order() {
    let names = ["first.example", "second.example", "third.example"];
    let bundle: String = names.iter().map(|n| self_signed(n)).collect();
    let file = write_bundle(&bundle);

    let chain = chain::from_file(file.path()).unwrap();
    assert_eq!(chain.len(), names.len());
    for (cert, name) in chain.iter().zip(names) {
        assert_eq!(cert.dns_names(), [name]);
    }
}

#[test]
fn test_ca_signed_bundle() {
    let identity = TestIdentity::ca_signed();
    let chain = chain::from_file(&identity.cert_path).unwrap();

    assert_eq!(chain.len(), 2);
    let leaf = chain.get(0).unwrap();
    let ca = chain.get(1).unwrap();
    assert_eq!(leaf.issuer(), ca.subject());
    assert_eq!(ca.issuer(), ca.subject());
    assert!(ca.dns_names().is_empty());
}

#[test]
fn test_not_after_is_reported_in_utc() {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(vec!["expiry.example".to_string()]).unwrap();
    params.not_before = date_time_ymd(2020, 1, 1);
    params.not_after = date_time_ymd(2031, 7, 15);
    let pem = params.self_signed(&key).unwrap().pem();

    let chain = chain::from_pem(pem.as_bytes()).unwrap();
    let not_after = chain.get(0).unwrap().not_after();
    assert_eq!((not_after.year(), not_after.month(), not_after.day()), (2031, 7, 15));
    assert_eq!((not_after.hour(), not_after.minute(), not_after.second()), (0, 0, 0));
    assert!(chain.to_string().contains("NotAfter: 2031-07-15 00:00:00 UTC"));
}

#[test]
fn test_missing_file() {
    let err = chain::from_file("does/not/exist.pem").unwrap_err();
    assert!(matches!(err, ParseError::UnreadableFile { .. }));
    assert_eq!(err.code(), ErrorCode::FileUnreadable);
}

#[test]
fn test_file_without_certificates() {
    let identity = TestIdentity::localhost();
    let err = chain::from_file(&identity.key_path).unwrap_err();
    assert!(matches!(err, ParseError::NoCertificates));
    assert_eq!(err.block(), None);
}

#[test]
fn test_broken_second_block_reports_index() {
    let good = self_signed("good.example");
    let broken = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
    let file = write_bundle(&format!("{good}{broken}"));

    let err = chain::from_file(file.path()).unwrap_err();
    assert_eq!(err.block(), Some(1));
    assert_eq!(err.code(), ErrorCode::CertificateParseError);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_bundle_length_matches_block_count(count in 1usize..5) {
        let bundle: String = (0..count).map(|i| self_signed(&format!("host{i}.example"))).collect();
        let chain = chain::from_pem(bundle.as_bytes()).unwrap();
        prop_assert_eq!(chain.len(), count);
        for (i, cert) in chain.iter().enumerate() {
            let expected = format!("host{i}.example");
            prop_assert_eq!(cert.dns_names(), [expected]);
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{ita, ItalianAspect, SignalAspect};

#[test]
fn ingredient_bits_match_persisted_encoding() {
    assert_eq!(ita::VIA_IMPEDITA, 0x01);
    assert_eq!(ita::VIA_LIBERA, 0x02);
    assert_eq!(ita::AVVISO_VIA_IMPEDITA, 0x03);
    assert_eq!(ita::DEVIATA, 0x04);
    assert_eq!(ita::AVVISO_RIDUZIONE_100, 0x18);
    assert_eq!(ita::RIDUZIONE_100, 0x60);
    assert_eq!(ita::BINARIO_INGOMBRO_TRONCO, 0x83);
}

#[test]
fn stop_aspects() {
    assert!(ItalianAspect::VIA_IMPEDITA.is_stop());
    assert!(ItalianAspect::BINARIO_INGOMBRO_TRONCO.is_stop());
    assert!(ItalianAspect::BINARIO_INGOMBRO_TRONCO_DEVIATO.is_stop());
    assert!(!ItalianAspect::VIA_LIBERA.is_stop());
    assert!(!ItalianAspect::VIA_LIBERA_AVVISO_VIA_IMPEDITA.is_stop());
}

#[test]
fn riduzione_to_avviso_shifts_down_one_slot() {
    assert_eq!(ItalianAspect::riduzione_to_avviso(ita::RIDUZIONE_30), ita::AVVISO_RIDUZIONE_30);
    assert_eq!(ItalianAspect::riduzione_to_avviso(ita::RIDUZIONE_60), ita::AVVISO_RIDUZIONE_60);
    assert_eq!(
        ItalianAspect::riduzione_to_avviso(ita::RIDUZIONE_100),
        ita::AVVISO_RIDUZIONE_100
    );
}

#[test]
fn plain_projection() {
    assert_eq!(ItalianAspect::UNKNOWN.to_plain(), SignalAspect::Unknown);
    assert_eq!(ItalianAspect::VIA_IMPEDITA.to_plain(), SignalAspect::Stop);
    assert_eq!(ItalianAspect::VIA_LIBERA.to_plain(), SignalAspect::Proceed);
    assert_eq!(
        ItalianAspect(ita::VIA_LIBERA | ita::RIDUZIONE_60).to_plain(),
        SignalAspect::ProceedReducedSpeed
    );
    assert_eq!(
        ItalianAspect::VIA_LIBERA_AVVISO_VIA_IMPEDITA.to_plain(),
        SignalAspect::ProceedReducedSpeed
    );
}

#[test]
fn display_names() {
    assert_eq!(ItalianAspect::VIA_IMPEDITA.to_string(), "via_impedita");
    assert_eq!(ItalianAspect::VIA_LIBERA.to_string(), "via_libera");
    assert_eq!(
        ItalianAspect(ita::VIA_LIBERA | ita::RIDUZIONE_30).to_string(),
        "via_libera_rid_30"
    );
    assert_eq!(
        ItalianAspect::BINARIO_INGOMBRO_TRONCO_DEVIATO.to_string(),
        "binario_ingombro_tronco_deviato"
    );
}

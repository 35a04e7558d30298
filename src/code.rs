//! PRN code generator, spec.md section 4.A.
//!
//! Standard G1/G2 LFSR pair with the documented G2 tap-delay selection per
//! PRN. Deterministic, no state retained across calls.

use rustfft::num_complex::Complex32;

use crate::types::{GnssSignal, Prn};

pub const L1CA_CODE_LEN: usize = 1023;

/// G2 shift-register delay per PRN (1-indexed by PRN number).
const G2_DELAY: [usize; 210] = [
    5, 6, 7, 8, 17, 18, 139, 140, 141, 251, 252, 254, 255, 256, 257, 258, 469, 470, 471, 472, 473,
    474, 509, 512, 513, 514, 515, 516, 859, 860, 861, 862, 863, 950, 947, 948, 950, 67, 103, 91,
    19, 679, 225, 625, 946, 638, 161, 1001, 554, 280, 710, 709, 775, 864, 558, 220, 397, 55, 898,
    759, 367, 299, 1018, 729, 695, 780, 801, 788, 732, 34, 320, 327, 389, 407, 525, 405, 221, 761,
    260, 326, 955, 653, 699, 422, 188, 438, 959, 539, 879, 677, 586, 153, 792, 814, 446, 264,
    1015, 278, 536, 819, 156, 957, 159, 712, 885, 461, 248, 713, 126, 807, 279, 122, 197, 693,
    632, 771, 467, 647, 203, 145, 175, 52, 21, 237, 235, 886, 657, 634, 762, 355, 1012, 176, 603,
    130, 359, 595, 68, 386, 797, 456, 499, 883, 307, 127, 211, 121, 118, 163, 628, 853, 484, 289,
    811, 202, 1021, 463, 568, 904, 670, 230, 911, 684, 309, 644, 932, 12, 314, 891, 212, 185, 675,
    503, 150, 395, 345, 846, 798, 992, 357, 995, 877, 112, 144, 476, 193, 109, 445, 291, 87, 399,
    292, 901, 339, 208, 711, 189, 263, 537, 663, 942, 173, 900, 30, 500, 935, 556, 373, 85, 652,
    310,
];

fn gen_l1ca_code(prn: Prn) -> [i8; L1CA_CODE_LEN] {
    let mut g1 = [0i8; L1CA_CODE_LEN];
    let mut g2 = [0i8; L1CA_CODE_LEN];
    let mut r1 = [-1i8; 10];
    let mut r2 = [-1i8; 10];

    for i in 0..L1CA_CODE_LEN {
        g1[i] = r1[9];
        g2[i] = r2[9];
        let c1 = r1[2] * r1[9];
        let c2 = r2[1] * r2[2] * r2[5] * r2[7] * r2[8] * r2[9];
        r1.rotate_right(1);
        r2.rotate_right(1);
        r1[0] = c1;
        r2[0] = c2;
    }

    let mut g = [0i8; L1CA_CODE_LEN];
    let mut j = L1CA_CODE_LEN - G2_DELAY[(prn - 1) as usize];
    for i in 0..L1CA_CODE_LEN {
        g[i] = -g1[i] * g2[j % L1CA_CODE_LEN];
        j += 1;
    }
    g
}

/// Generate the length-1023 ±1 chip sequence for `prn` on `signal`.
/// Returns `None` for any signal other than L1 C/A (multi-constellation
/// support is out of scope, spec.md section 1).
pub fn gen_code(signal: GnssSignal, prn: Prn) -> Option<Vec<i8>> {
    match signal {
        GnssSignal::L1Ca => Some(gen_l1ca_code(prn).to_vec()),
    }
}

/// Guard-padded complex code table of length 1025: index `0` holds the
/// last chip, index `1024` holds the first chip, so fractional-sample
/// early/late interpolation windows never address out of range,
/// spec.md section 4.A.
pub fn gen_guarded_code_complex(signal: GnssSignal, prn: Prn) -> Option<Vec<Complex32>> {
    let code = gen_code(signal, prn)?;
    let mut out = Vec::with_capacity(code.len() + 2);
    out.push(Complex32::new(*code.last().unwrap() as f32, 0.0));
    out.extend(code.iter().map(|&c| Complex32::new(c as f32, 0.0)));
    out.push(Complex32::new(code[0] as f32, 0.0));
    Some(out)
}

pub fn get_code_period_secs(signal: GnssSignal) -> f64 {
    match signal {
        GnssSignal::L1Ca => 1e-3,
    }
}

pub fn get_code_len(signal: GnssSignal) -> f64 {
    match signal {
        GnssSignal::L1Ca => L1CA_CODE_LEN as f64,
    }
}

pub fn get_code_freq_hz(signal: GnssSignal) -> f64 {
    match signal {
        GnssSignal::L1Ca => 1575.42e6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_is_bipolar_and_correct_length() {
        let g = gen_code(GnssSignal::L1Ca, 1).unwrap();
        assert_eq!(g.len(), L1CA_CODE_LEN);
        assert!(g.iter().all(|&v| v == 1 || v == -1));
    }

    #[test]
    fn distinct_prns_are_distinguishable() {
        let g1 = gen_code(GnssSignal::L1Ca, 1).unwrap();
        let g2 = gen_code(GnssSignal::L1Ca, 2).unwrap();
        assert_ne!(g1, g2);
    }

    #[test]
    fn guard_chips_wrap_correctly() {
        let code = gen_code(GnssSignal::L1Ca, 5).unwrap();
        let guarded = gen_guarded_code_complex(GnssSignal::L1Ca, 5).unwrap();
        assert_eq!(guarded.len(), L1CA_CODE_LEN + 2);
        assert_eq!(guarded[0].re, code[L1CA_CODE_LEN - 1] as f32);
        assert_eq!(guarded[L1CA_CODE_LEN + 1].re, code[0] as f32);
    }

    #[test]
    fn autocorrelation_peaks_at_zero_lag() {
        let g = gen_code(GnssSignal::L1Ca, 7).unwrap();
        let n = g.len();
        let zero_lag: i32 = g.iter().map(|&c| (c as i32) * (c as i32)).sum();
        for lag in 1..n {
            let shifted: i32 = (0..n).map(|i| (g[i] as i32) * (g[(i + lag) % n] as i32)).sum();
            assert!(shifted.abs() < zero_lag);
        }
    }
}

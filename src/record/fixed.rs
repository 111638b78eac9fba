//! Fixed-size record layouts (HOPS 3.17).
//!
//! Each structure is the complete on-disk record, header included.  Versions
//! of one type that differ only in array lengths get their own structure.

use super::wire::{layout, ApStart, Array, Date, RecordStart, SkyCoord, Text};

// ── Sub-structures ───────────────────────────────────────────────────────────

layout! {
    /// One frequency channel definition of a type-203 record.
    pub struct ChannelDef {
        index:        i16,
        sample_rate:  u16,
        sideband:     Array<Text<1>, 2>,
        polarization: Array<Text<1>, 2>,
        freq:         Array<f64, 2>,
        chan_id:      Array<Text<8>, 2>,
    }

    /// Fourfit channel id and the type-203 indices it draws from.
    pub struct FfitChan {
        id:     Text<1>,
        unused: Text<1>,
        chans:  Array<i16, 4>,
    }

    pub struct Sidebands {
        lsb: i16,
        usb: i16,
    }

    pub struct SidebandWeights {
        lsb: f64,
        usb: f64,
    }

    pub struct SidebandFloats {
        lsb: f32,
        usb: f32,
    }

    pub struct AmpPhase {
        amp:   f32,
        phase: f32,
    }

    pub struct TrackStat {
        error_count:  i32,
        frames:       i32,
        bad_frames:   i32,
        slip_sync:    i32,
        missing_sync: i32,
        crc_error:    i32,
    }

    pub struct StateCount {
        chan_id: Text<32>,
        big_pos: i32,
        pos:     i32,
        neg:     i32,
        big_neg: i32,
    }

    pub struct StateCounter {
        count:     Array<u32, 8>,
        val_count: u32,
    }

    pub struct PcalTone {
        chan_id:   Text<8>,
        frequency: f32,
        real:      f32,
        imaginary: f32,
    }

    /// Phase-cal accumulators for one channel, 16 tones.
    pub struct ToneAccumulators16 {
        chan_name: Text<8>,
        freq:      f64,
        acc:       Array<Array<i32, 2>, 16>,
    }

    /// Phase-cal accumulators for one channel, 64 tones.
    pub struct ToneAccumulators64 {
        chan_name: Text<8>,
        freq:      f64,
        acc:       Array<Array<i32, 2>, 64>,
    }
}

// ── 000, 100: file and correlation headers ───────────────────────────────────

layout! {
    /// File header: creation date and the file's own name.
    pub struct Type000 {
        head: RecordStart,
        date: Text<16>,
        name: Text<40>,
    }

    /// Correlation general information.
    pub struct Type100 {
        head:      RecordStart,
        proc_time: Date,
        baseline:  Text<2>,
        rootname:  Text<34>,
        qcode:     Text<2>,
        unused2:   Text<6>,
        pct_done:  f32,
        start:     Date,
        stop:      Date,
        n_drec:    i32,
        n_index:   i32,
        n_lags:    i16,
        n_blocks:  i16,
    }
}

// ── 130–150: per-AP correlator state ─────────────────────────────────────────

layout! {
    pub struct Type130 {
        ap:                 ApStart,
        enabled:            u32,
        occurred:           u32,
        x_su_id:            i32,
        x_ch_id:            i32,
        x_cf_num:           i32,
        x_checksum:         i32,
        x_in_bd_link:       i32,
        x_in_bd_sync:       i32,
        y_su_id:            i32,
        y_ch_id:            i32,
        y_cf_num:           i32,
        y_checksum:         i32,
        y_in_bd_link:       i32,
        y_in_bd_sync:       i32,
        head_tape_past_end: i32,
        head_tape_3_carry:  i32,
        tail_tape_past_end: i32,
        tail_tape_3_carry:  i32,
    }

    pub struct Type131 {
        ap:          ApStart,
        link_status: Array<u32, 64>,
    }

    pub struct Type141 {
        ap:                   ApStart,
        su_id:                u32,
        ch_id:                u32,
        cf_num:               u32,
        delay_err:            i32,
        delay_err_rate:       i32,
        phase:                i32,
        phase_rate:           i32,
        phase_acc:            i32,
        phase_log_inc_period: i32,
        phase_k_acc_seg_len:  i32,
        sideband:             i32,
        oversampling_factor:  i32,
        checksum:             u32,
        flags:                u32,
    }

    pub struct Type142 {
        ap:                 ApStart,
        phase_adj:          u32,
        phase_inc_clk_div:  u32,
        phase_rate_inc_cnt: u32,
        phase:              i32,
        phase_rate:         i32,
        phase_acc:          i32,
        x_delay:            i32,
        x_delay_rate:       i32,
        y_delay:            i32,
        y_delay_rate:       i32,
        b_delay:            i32,
        b_delay_rate:       i32,
        tape_pos:           u32,
        x_dly_rate_sign:    u32,
        y_dly_rate_sign:    u32,
        b_dly_rate_sign:    u32,
        udr:                u32,
        unused2:            Text<4>,
    }

    pub struct Type143 {
        ap:                       ApStart,
        phase_adj:                u32,
        phase_inc_clk_div:        u32,
        phase_rate_inc_cnt_final: u32,
        phase_rate_final:         i32,
        phase_final:              i32,
        phase_initial:            i32,
        x_delay_final:            i32,
        x_delay_initial:          i32,
        y_delay_final:            i32,
        y_delay_initial:          i32,
        b_delay_final:            i32,
        b_delay_initial:          i32,
        tape_pos_final:           u32,
        tape_err:                 u32,
        udr:                      u32,
        unused2:                  Text<4>,
    }

    pub struct Type144 {
        ap:          ApStart,
        su_id_ex:    u32,
        su_id_rx:    u32,
        ch_id_ex:    u32,
        ch_id_rx:    u32,
        cf_num_ex:   u32,
        cf_num_rx:   u32,
        checksum_ex: u32,
        checksum_rx: u32,
    }

    pub struct Type150 {
        ap:      ApStart,
        qcode:   Text<2>,
        unused2: Text<6>,
    }
}

// ── 200–210: fringe-fit results ──────────────────────────────────────────────

layout! {
    /// General fringe-fit information.
    pub struct Type200 {
        head:              RecordStart,
        software_revision: Array<i16, 10>,
        experiment_number: i32,
        experiment_name:   Text<32>,
        scan_name:         Text<32>,
        corr_name:         Text<8>,
        scan_time:         Date,
        start_offset:      i32,
        stop_offset:       i32,
        corr_time:         Date,
        ffit_proc_time:    Date,
        ffit_ref_time:     Date,
    }

    /// Source information.
    pub struct Type201 {
        head:         RecordStart,
        source:       Text<32>,
        coord:        SkyCoord,
        epoch:        i16,
        unused2:      Text<2>,
        coord_time:   Date,
        ra_rate:      f64,
        dec_rate:     f64,
        pulsar_phase: Array<f64, 4>,
        pulsar_epoch: f64,
        dispersion:   f64,
    }

    /// Baseline geometry.
    pub struct Type202 {
        head:             RecordStart,
        baseline:         Text<2>,
        station_id:       Array<Text<2>, 2>,
        station_name:     Array<Text<8>, 2>,
        tape:             Array<Text<8>, 2>,
        nlags:            i16,
        position:         Array<Array<f64, 2>, 3>,
        u:                f64,
        v:                f64,
        uf:               f64,
        vf:               f64,
        clock:            Array<f32, 2>,
        clock_rate:       Array<f32, 2>,
        instrument_delay: Array<f32, 2>,
        z_atm_delay:      Array<f32, 2>,
        elevation:        Array<f32, 2>,
        azimuth:          Array<f32, 2>,
    }

    /// Channel definitions, 32 channels.
    pub struct Type203V0 {
        head:     RecordStart,
        channels: Array<ChannelDef, 32>,
    }

    /// Channel definitions, 512 channels.
    pub struct Type203V1 {
        head:     RecordStart,
        channels: Array<ChannelDef, 512>,
    }

    /// Fourfit execution setup.
    pub struct Type204 {
        head:         RecordStart,
        ff_version:   Array<i16, 2>,
        platform:     Text<8>,
        control_file: Text<96>,
        cf_time:      Date,
        #[serde(rename = "override")]
        override_:    Text<128>,
    }

    /// Fourfit setup, 16 fourfit channels.
    pub struct Type205V0 {
        head:        RecordStart,
        utc_central: Date,
        offset:      f32,
        ffmode:      Array<Text<1>, 8>,
        search:      Array<Array<f32, 2>, 3>,
        filter:      Array<f32, 8>,
        start:       Date,
        stop:        Date,
        ref_freq:    f64,
        ffit_chans:  Array<FfitChan, 16>,
    }

    /// Fourfit setup, 64 fourfit channels.
    pub struct Type205V1 {
        head:        RecordStart,
        utc_central: Date,
        offset:      f32,
        ffmode:      Array<Text<1>, 8>,
        search:      Array<Array<f32, 2>, 3>,
        filter:      Array<f32, 8>,
        start:       Date,
        stop:        Date,
        ref_freq:    f64,
        ffit_chans:  Array<FfitChan, 64>,
    }

    /// Data filtering statistics.
    pub struct Type206V0 {
        head:             RecordStart,
        start:            Date,
        first_ap:         i16,
        last_ap:          i16,
        accepted:         Array<Sidebands, 16>,
        integration_time: f32,
        accept_ratio:     f32,
        discard:          f32,
        reasons:          Array<Array<Sidebands, 16>, 8>,
        rate_size:        i16,
        mbd_size:         i16,
        sbd_size:         i16,
        unused2:          Text<6>,
    }

    pub struct Type206V1 {
        head:             RecordStart,
        start:            Date,
        first_ap:         i16,
        last_ap:          i16,
        accepted:         Array<Sidebands, 16>,
        weights:          Array<SidebandWeights, 16>,
        integration_time: f32,
        accept_ratio:     f32,
        discard:          f32,
        reasons:          Array<Array<Sidebands, 16>, 8>,
        rate_size:        i16,
        mbd_size:         i16,
        sbd_size:         i16,
        unused2:          Text<6>,
    }

    pub struct Type206V2 {
        head:             RecordStart,
        start:            Date,
        first_ap:         i16,
        last_ap:          i16,
        accepted:         Array<Sidebands, 64>,
        weights:          Array<SidebandWeights, 64>,
        integration_time: f32,
        accept_ratio:     f32,
        discard:          f32,
        reasons:          Array<Array<Sidebands, 64>, 8>,
        rate_size:        i16,
        mbd_size:         i16,
        sbd_size:         i16,
        unused2:          Text<6>,
    }

    /// Phase-cal and error rate.
    pub struct Type207V0 {
        head:     RecordStart,
        pc_amp:   Array<Array<SidebandFloats, 16>, 2>,
        pc_phase: Array<Array<SidebandFloats, 16>, 2>,
        pc_freq:  Array<Array<SidebandFloats, 16>, 2>,
        pc_rate:  Array<f32, 2>,
        err_rate: Array<Array<f32, 16>, 2>,
    }

    pub struct Type207V1 {
        head:      RecordStart,
        pc_mode:   i32,
        unused2:   i32,
        pc_amp:    Array<Array<SidebandFloats, 16>, 2>,
        pc_phase:  Array<Array<SidebandFloats, 16>, 2>,
        pc_offset: Array<Array<SidebandFloats, 16>, 2>,
        pc_freq:   Array<Array<SidebandFloats, 16>, 2>,
        pc_rate:   Array<f32, 2>,
        err_rate:  Array<Array<f32, 16>, 2>,
    }

    pub struct Type207V2 {
        head:      RecordStart,
        pc_mode:   i32,
        unused2:   i32,
        pc_amp:    Array<Array<SidebandFloats, 64>, 2>,
        pc_phase:  Array<Array<SidebandFloats, 64>, 2>,
        pc_offset: Array<Array<SidebandFloats, 64>, 2>,
        pc_freq:   Array<Array<SidebandFloats, 64>, 2>,
        pc_rate:   Array<f32, 2>,
        err_rate:  Array<Array<f32, 64>, 2>,
    }

    /// Solution parameters.
    pub struct Type208V0 {
        head:           RecordStart,
        quality:        Text<1>,
        errcode:        Text<1>,
        tape_qcode:     Text<6>,
        apriori_delay:  f64,
        apriori_rate:   f64,
        apriori_accel:  f64,
        total_mbd:      f64,
        total_sbd:      f64,
        total_rate:     f64,
        total_mbd_ref:  f64,
        total_sbd_ref:  f64,
        total_rate_ref: f64,
        resid_mbd:      f32,
        resid_sbd:      f32,
        resid_rate:     f32,
        mbd_err:        f32,
        sbd_err:        f32,
        rate_err:       f32,
        ambiguity:      f32,
        amplitude:      f32,
        inc_seg_amp:    f32,
        inc_chan_amp:   f32,
        snr:            f32,
        prob_false:     f32,
        total_phase:    f32,
        resid_phase:    f32,
    }

    pub struct Type208V1 {
        head:            RecordStart,
        quality:         Text<1>,
        errcode:         Text<1>,
        tape_qcode:      Text<6>,
        apriori_delay:   f64,
        apriori_rate:    f64,
        apriori_accel:   f64,
        total_mbd:       f64,
        total_sbd:       f64,
        total_rate:      f64,
        total_mbd_ref:   f64,
        total_sbd_ref:   f64,
        total_rate_ref:  f64,
        resid_mbd:       f32,
        resid_sbd:       f32,
        resid_rate:      f32,
        mbd_err:         f32,
        sbd_err:         f32,
        rate_err:        f32,
        ambiguity:       f32,
        amplitude:       f32,
        inc_seg_amp:     f32,
        inc_chan_amp:    f32,
        snr:             f32,
        prob_false:      f32,
        total_phase:     f32,
        total_phase_ref: f32,
        resid_phase:     f32,
        tec_err:         f32,
    }

    /// Channel amplitudes and phases, 16 channels.
    pub struct Type210V0 {
        head:      RecordStart,
        amp_phase: Array<AmpPhase, 16>,
    }

    /// Channel amplitudes and phases, 64 channels.
    pub struct Type210V1 {
        head:      RecordStart,
        amp_phase: Array<AmpPhase, 64>,
    }
}

// ── 300–309: station data ────────────────────────────────────────────────────

layout! {
    /// Station model header.
    pub struct Type300 {
        head:           RecordStart,
        id:             Text<1>,
        station_id:     Text<2>,
        name:           Text<32>,
        unused2:        Text<1>,
        model_start:    Date,
        model_interval: f32,
        n_splines:      i16,
        unused3:        Text<2>,
    }

    pub struct Type301 {
        head:         RecordStart,
        interval:     i16,
        chan_id:      Text<32>,
        unused2:      Text<6>,
        delay_spline: Array<f64, 6>,
    }

    pub struct Type302 {
        head:         RecordStart,
        interval:     i16,
        chan_id:      Text<32>,
        unused2:      Text<6>,
        phase_spline: Array<f64, 6>,
    }

    pub struct Type303 {
        head:              RecordStart,
        interval:          i16,
        chan_id:           Text<32>,
        unused2:           Text<6>,
        azimuth:           Array<f64, 6>,
        elevation:         Array<f64, 6>,
        parallactic_angle: Array<f64, 6>,
        u:                 Array<f64, 6>,
        v:                 Array<f64, 6>,
        w:                 Array<f64, 6>,
    }

    pub struct Type304 {
        head:        RecordStart,
        time:        Date,
        duration:    f32,
        track_stats: Array<TrackStat, 64>,
    }

    pub struct Type306 {
        head:         RecordStart,
        time:         Date,
        duration:     f32,
        state_counts: Array<StateCount, 16>,
    }

    pub struct Type307 {
        head:         RecordStart,
        su:           i32,
        unused0:      Text<4>,
        tot:          f64,
        rot:          f64,
        accum_period: f64,
        frame_count:  u32,
        counts:       Array<StateCounter, 16>,
        unused1:      Text<4>,
    }

    pub struct Type308 {
        head:     RecordStart,
        time:     Date,
        duration: f32,
        pcal:     Array<PcalTone, 32>,
    }

    /// Phase-cal accumulators, 16 channels of 16 tones.
    pub struct Type309V0 {
        head:       RecordStart,
        su:         i32,
        ntones:     i32,
        rot:        f64,
        acc_period: f64,
        ch_tag:     Array<ToneAccumulators16, 16>,
    }

    /// Phase-cal accumulators, 64 channels of 64 tones.
    pub struct Type309V1 {
        head:       RecordStart,
        su:         i32,
        ntones:     i32,
        rot:        f64,
        acc_period: f64,
        ch_tag:     Array<ToneAccumulators64, 64>,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::wire::Wire;

    #[test]
    fn header_sizes() {
        assert_eq!(Type000::SIZE, 64);
        assert_eq!(Type100::SIZE, 104);
        assert_eq!(Type150::SIZE, 32);
    }

    #[test]
    fn fringe_sizes() {
        assert_eq!(ChannelDef::SIZE, 40);
        assert_eq!(FfitChan::SIZE, 10);
        assert_eq!(Type200::SIZE, 160);
        assert_eq!(Type201::SIZE, 136);
        assert_eq!(Type202::SIZE, 176);
        assert_eq!(Type203V0::SIZE, 8 + 32 * 40);
        assert_eq!(Type203V1::SIZE, 8 + 512 * 40);
        assert_eq!(Type204::SIZE, 8 + 4 + 8 + 96 + 12 + 128);
        assert_eq!(Type205V0::SIZE, 8 + 12 + 4 + 8 + 24 + 32 + 12 + 12 + 8 + 160);
        assert_eq!(Type208V0::SIZE, 8 + 8 + 9 * 8 + 14 * 4);
        assert_eq!(Type208V1::SIZE, Type208V0::SIZE + 8);
        assert_eq!(Type210V1::SIZE, 8 + 64 * 8);
    }

    #[test]
    fn station_sizes() {
        assert_eq!(Type300::SIZE, 8 + 1 + 2 + 32 + 1 + 12 + 4 + 2 + 2);
        assert_eq!(Type304::SIZE, 8 + 12 + 4 + 64 * 24);
        assert_eq!(Type309V0::SIZE, 8 + 4 + 4 + 8 + 8 + 16 * (8 + 8 + 16 * 8));
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Flow-key extraction.
//!
//! The key is a pure function of the frame bytes and ingress port.
//! Every read is bounds-checked; a header that does not fit ends the
//! walk with the remaining key fields zero. Transport ports are never
//! populated from a fragment or a truncated header.

use crate::engine::arp::ArpEthIpv4Raw;
use crate::engine::arp::ARP_ETH_IPV4_LEN;
use crate::engine::ether::EtherHdrRaw;
use crate::engine::ether::LlcSnapHdrRaw;
use crate::engine::ether::ETHER_HDR_LEN;
use crate::engine::ether::ETHER_TYPE_ARP;
use crate::engine::ether::ETHER_TYPE_IPV4;
use crate::engine::ether::ETHER_TYPE_VLAN;
use crate::engine::ether::VlanHdrRaw;
use crate::engine::ether::LLC_HDR_LEN;
use crate::engine::ether::VLAN_HDR_LEN;
use crate::engine::flow::FlowKey;
use crate::engine::ip4::Ipv4HdrRaw;
use crate::engine::ip4::IPPROTO_TCP;
use crate::engine::ip4::IPPROTO_UDP;
use crate::engine::ip4::IPV4_HDR_LEN;
use crate::engine::packet::Frame;
use crate::engine::tcp::TcpHdrRaw;
use crate::engine::tcp::TCP_HDR_LEN;
use crate::engine::udp::UdpHdrRaw;
use crate::engine::udp::UDP_HDR_LEN;
use ofp::DL_TYPE_ETH2_CUTOFF;
use ofp::DL_TYPE_NOT_ETH_TYPE;
use ofp::VLAN_NONE;

/// Extract the flow key for a frame arriving on `in_port`, recording
/// the frame's L3/L4 offsets along the way. The second return value
/// reports an IPv4 fragment.
pub fn flow_extract(frame: &mut Frame, in_port: u16) -> (FlowKey, bool) {
    let mut key = FlowKey { in_port, ..Default::default() };
    frame.set_l3(None);
    frame.set_l4(None);

    let bytes = frame.bytes();
    let Some(eth) = EtherHdrRaw::parse(bytes) else {
        return (key, false);
    };

    let mut off = ETHER_HDR_LEN;
    let mut dl_type = eth.ether_type();

    if dl_type < DL_TYPE_ETH2_CUTOFF {
        // 802.2. Only SNAP with a zero OUI names a real EtherType.
        let Some(llc) = LlcSnapHdrRaw::parse(&bytes[off..]) else {
            return (key, false);
        };

        if llc.is_snap() {
            dl_type = llc.snap_type();
            off += core::mem::size_of::<LlcSnapHdrRaw>();
        } else {
            dl_type = DL_TYPE_NOT_ETH_TYPE;
            off += LLC_HDR_LEN;
        }
    }

    if dl_type == ETHER_TYPE_VLAN {
        let Some(vlan) = VlanHdrRaw::parse(&bytes[off..]) else {
            return (key, false);
        };

        key.dl_vlan = vlan.vid();
        dl_type = vlan.ether_type();
        off += VLAN_HDR_LEN;
    } else {
        key.dl_vlan = VLAN_NONE;
    }

    key.dl_type = dl_type;
    key.dl_src = eth.src;
    key.dl_dst = eth.dst;

    let l3 = off;
    let mut l4 = None;
    let mut is_fragment = false;

    if dl_type == ETHER_TYPE_IPV4 {
        if let Some(ip) = Ipv4HdrRaw::parse(&bytes[off..]) {
            key.nw_src = ip.src();
            key.nw_dst = ip.dst();
            key.nw_proto = ip.proto;

            if ip.is_fragment() {
                is_fragment = true;
            } else if ip.hdr_len() >= IPV4_HDR_LEN {
                let ulp_off = off + ip.hdr_len();
                match key.nw_proto {
                    IPPROTO_TCP => {
                        if bytes.len() >= ulp_off + TCP_HDR_LEN {
                            if let Some(th) = TcpHdrRaw::parse(&bytes[ulp_off..])
                            {
                                key.tp_src = th.src_port();
                                key.tp_dst = th.dst_port();
                                l4 = Some(ulp_off);
                            }
                        }
                    }

                    IPPROTO_UDP => {
                        if bytes.len() >= ulp_off + UDP_HDR_LEN {
                            if let Some(uh) = UdpHdrRaw::parse(&bytes[ulp_off..])
                            {
                                key.tp_src = uh.src_port();
                                key.tp_dst = uh.dst_port();
                                l4 = Some(ulp_off);
                            }
                        }
                    }

                    _ => (),
                }
            }
        }
    } else if dl_type == ETHER_TYPE_ARP && bytes.len() >= off + ARP_ETH_IPV4_LEN
    {
        if let Some(arp) = ArpEthIpv4Raw::parse(&bytes[off..]) {
            if arp.is_eth_ipv4() {
                key.nw_src = arp.spa();
                key.nw_dst = arp.tpa();
            }
        }
    }

    frame.set_l3(Some(l3));
    frame.set_l4(l4);
    (key, is_fragment)
}

#[cfg(test)]
mod test {
    use super::*;

    fn base_udp_frame() -> Vec<u8> {
        let mut f = Vec::new();
        // Ethernet
        f.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x02]); // dst
        f.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]); // src
        f.extend_from_slice(&ETHER_TYPE_IPV4.to_be_bytes());
        // IPv4, ihl=5, proto=UDP
        f.extend_from_slice(&[0x45, 0x00]);
        f.extend_from_slice(&36u16.to_be_bytes()); // total len
        f.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // ident, frag
        f.extend_from_slice(&[0x40, IPPROTO_UDP, 0x00, 0x00]); // ttl, proto, csum
        f.extend_from_slice(&[10, 0, 0, 1]);
        f.extend_from_slice(&[10, 0, 0, 2]);
        // UDP
        f.extend_from_slice(&1u16.to_be_bytes()); // src port
        f.extend_from_slice(&0u16.to_be_bytes()); // dst port
        f.extend_from_slice(&16u16.to_be_bytes()); // len
        f.extend_from_slice(&[0x00, 0x00]); // csum
        f.extend_from_slice(&[0xab; 8]);
        f
    }

    #[test]
    fn udp_key_fields() {
        let mut frame = Frame::new(base_udp_frame());
        let (key, frag) = flow_extract(&mut frame, 1);

        assert!(!frag);
        assert_eq!(key.in_port, 1);
        assert_eq!(key.dl_vlan, VLAN_NONE);
        assert_eq!(key.dl_type, ETHER_TYPE_IPV4);
        assert_eq!(key.nw_src, 0x0a00_0001);
        assert_eq!(key.nw_dst, 0x0a00_0002);
        assert_eq!(key.nw_proto, IPPROTO_UDP);
        assert_eq!(key.tp_src, 1);
        assert_eq!(key.tp_dst, 0);
        assert_eq!(frame.l3(), Some(14));
        assert_eq!(frame.l4(), Some(34));
    }

    #[test]
    fn key_is_pure() {
        let mut a = Frame::new(base_udp_frame());
        let mut b = Frame::new(base_udp_frame());
        assert_eq!(flow_extract(&mut a, 7).0, flow_extract(&mut b, 7).0);
        assert_ne!(flow_extract(&mut a, 7).0, flow_extract(&mut b, 8).0);
    }

    #[test]
    fn vlan_tag_lifts_inner_type() {
        let mut f = base_udp_frame();
        // Splice a tag in after the MACs: 8100, tci with pcp=3 vid=5.
        let tci = (3u16 << 13) | 5;
        let mut tag = Vec::new();
        tag.extend_from_slice(&ETHER_TYPE_VLAN.to_be_bytes());
        tag.extend_from_slice(&tci.to_be_bytes());
        f.splice(12..12, tag);

        let mut frame = Frame::new(f);
        let (key, _) = flow_extract(&mut frame, 2);
        assert_eq!(key.dl_vlan, 5);
        assert_eq!(key.dl_type, ETHER_TYPE_IPV4);
        assert_eq!(key.tp_src, 1);
        assert_eq!(frame.l3(), Some(18));
    }

    #[test]
    fn fragment_leaves_transport_zero() {
        let mut f = base_udp_frame();
        // Set the more-fragments bit.
        f[20..22].copy_from_slice(&0x2000u16.to_be_bytes());

        let mut frame = Frame::new(f);
        let (key, frag) = flow_extract(&mut frame, 1);
        assert!(frag);
        assert_eq!(key.nw_proto, IPPROTO_UDP);
        assert_eq!(key.tp_src, 0);
        assert_eq!(key.tp_dst, 0);
        assert_eq!(frame.l4(), None);
    }

    #[test]
    fn truncated_transport_leaves_ports_zero() {
        let mut f = base_udp_frame();
        f.truncate(14 + 20 + 4); // half a UDP header

        let mut frame = Frame::new(f);
        let (key, frag) = flow_extract(&mut frame, 1);
        assert!(!frag);
        assert_eq!(key.nw_src, 0x0a00_0001);
        assert_eq!(key.tp_src, 0);
        assert_eq!(frame.l4(), None);
    }

    #[test]
    fn non_snap_llc_gets_sentinel_type() {
        let mut f = Vec::new();
        f.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x02]);
        f.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
        f.extend_from_slice(&100u16.to_be_bytes()); // 802.3 length
        f.extend_from_slice(&[0x42, 0x42, 0x03]); // spanning-tree LLC
        f.extend_from_slice(&[0u8; 40]);

        let mut frame = Frame::new(f);
        let (key, _) = flow_extract(&mut frame, 1);
        assert_eq!(key.dl_type, DL_TYPE_NOT_ETH_TYPE);
        assert_eq!(key.dl_src, [0x02, 0, 0, 0, 0, 0x01]);
    }

    #[test]
    fn arp_records_sender_and_target() {
        let mut f = Vec::new();
        f.extend_from_slice(&[0xff; 6]);
        f.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]);
        f.extend_from_slice(&ETHER_TYPE_ARP.to_be_bytes());
        f.extend_from_slice(&1u16.to_be_bytes()); // htype
        f.extend_from_slice(&0x0800u16.to_be_bytes()); // ptype
        f.push(6); // hlen
        f.push(4); // plen
        f.extend_from_slice(&1u16.to_be_bytes()); // op: request
        f.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01]); // sha
        f.extend_from_slice(&[10, 0, 0, 1]); // spa
        f.extend_from_slice(&[0; 6]); // tha
        f.extend_from_slice(&[10, 0, 0, 9]); // tpa

        let mut frame = Frame::new(f);
        let (key, _) = flow_extract(&mut frame, 1);
        assert_eq!(key.dl_type, ETHER_TYPE_ARP);
        assert_eq!(key.nw_src, 0x0a00_0001);
        assert_eq!(key.nw_dst, 0x0a00_0009);
        assert_eq!(key.nw_proto, 0);
    }

    #[test]
    fn runt_frame_yields_port_only_key() {
        let mut frame = Frame::new(vec![0u8; 10]);
        let (key, frag) = flow_extract(&mut frame, 3);
        assert!(!frag);
        assert_eq!(key.in_port, 3);
        assert_eq!(key.dl_type, 0);
        assert_eq!(key.dl_src, [0; 6]);
    }
}

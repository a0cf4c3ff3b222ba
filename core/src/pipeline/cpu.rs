//! Top-level CPU component: `Rv32` elaborates the single netlist that
//! computes every pipeline-latch input and control signal in one
//! topologically-ordered pass per cycle, the five-stage pipeline's
//! analogue of a `hcl!` block. It owns no state itself — the stateful
//! register file/CSR file/TLBs/reservation register live in
//! [`crate::units::Units`]; `Rv32` only supplies the functions wired
//! into the elaborated schedule.

use crate::bitvec::BitVec;
use crate::isa::decode::{self, Control};
use crate::isa::{alu_funct3, amo_funct5, cause, csr, funct7, mem_funct3, mext_funct3, sys_funct3, sys_imm, PrivMode};
use crate::framework::{CpuArch, CpuCircuit, CpuSim, PipeSim, PropCircuit, PropOrderBuilder, StageInfo, TunnelEvent};
use crate::netlist::expr::{Env, Expr};
use crate::pipeline::mmu::{self, AccessKind};
use crate::pipeline::{ExMem, IdEx, IfId, Latches, MemWb};
use crate::units::alu::{self, AluOp};
use crate::units::amo::RmwOp;
use crate::units::branch;
use crate::units::csr::CsrWrite;
use crate::units::forward::{self, ForwardSource};
use crate::units::regfile::RegisterFileIn;
use crate::units::{hazard, Units};

/// The netlist's external input port bundle: reset, the three
/// interrupt lines, and the debug register-read address. Everything else
/// the pipeline needs is already owned by [`Units`] or threaded through
/// [`Inter`]/[`Latches`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuIn {
    pub rst: bool,
    pub irq_software: bool,
    pub irq_timer: bool,
    pub irq_external: bool,
    pub debug_reg_addr: u8,
}

/// The netlist's external output (debug tap) port bundle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuOut {
    pub debug_pc: u32,
    pub debug_inst: u32,
    pub debug_x1: u32,
    pub debug_x2: u32,
    pub debug_x10: u32,
    pub debug_x11: u32,
    pub debug_reg_data: u32,
}

/// Intermediate signals computed by one stage's update and consumed by a
/// later one within the same cycle — the wires strung between the
/// elaborated schedule's nodes.
#[derive(Debug, Clone, Default)]
pub struct Inter {
    // decode_wb
    id_rs1: u8,
    id_rs2: u8,
    id_rs1_val: u32,
    id_rs2_val: u32,

    // hazard_forward
    stall: bool,
    forward_rs1: ForwardSource,
    forward_rs2: ForwardSource,

    // execute
    ex_mem_next: ExMem,
    control_transfer: bool,
    redirect_pc: u32,
    priv_mode_next: PrivMode,

    // fetch
    next_pc: u32,
    next_if_id: IfId,

    // memory
    mem_wb_next: MemWb,
}

pub struct Rv32;

impl CpuCircuit for Rv32 {
    type UnitIn = CpuIn;
    type UnitOut = CpuOut;
    type Inter = Inter;
    type StageState = Latches;
}

/// Priority-ordered pending-interrupt check: highest-priority
/// pending *and* individually-enabled *and* globally-enabled-for-the-
/// current-privilege-level interrupt wins. `cur_priv < M` always takes
/// machine interrupts (global enable only matters at or above the
/// target privilege); delegated (`mideleg`) interrupts are only taken
/// while below or at S, mirroring synchronous-exception delegation.
#[allow(clippy::too_many_arguments)]
fn pending_interrupt(
    mstatus: u32,
    mie: u32,
    mip: u32,
    mideleg: u32,
    cur_priv: PrivMode,
) -> Option<u64> {
    let global_m = cur_priv != PrivMode::Machine || (mstatus & (1 << 3)) != 0; // MIE bit 3
    let global_s = cur_priv == PrivMode::User || (cur_priv == PrivMode::Supervisor && (mstatus & (1 << 1)) != 0); // SIE bit 1

    // (mip bit, mcause code, delegatable-to-S)
    const MEI: u32 = 1 << 11;
    const MSI: u32 = 1 << 3;
    const MTI: u32 = 1 << 7;
    const SEI: u32 = 1 << 9;
    const SSI: u32 = 1 << 1;
    const STI: u32 = 1 << 5;

    let pending_enabled = mip & mie;
    let order = [
        (MEI, cause::MACHINE_EXTERNAL, false),
        (MSI, cause::MACHINE_SOFTWARE, false),
        (MTI, cause::MACHINE_TIMER, false),
        (SEI, cause::SUPERVISOR_EXTERNAL, true),
        (SSI, cause::SUPERVISOR_SOFTWARE, true),
        (STI, cause::SUPERVISOR_TIMER, true),
    ];
    for (bit, code, delegatable) in order {
        if pending_enabled & bit == 0 {
            continue;
        }
        let delegated = delegatable && (mideleg & bit) != 0;
        let taken = if delegated { global_s } else { global_m };
        if taken {
            return Some(code | cause::INTERRUPT_BIT);
        }
    }
    None
}

/// Select the next fetch PC, a textbook
/// case for the behavior DSL: trap redirect beats a taken branch/jump
/// beats a load-use stall (hold) beats the normal sequential PC+4.
#[allow(clippy::too_many_arguments)]
fn select_next_pc(trap: bool, control_transfer: bool, stall: bool, trap_target: u32, redirect: u32, cur_pc: u32) -> u32 {
    let mut env = Env::new();
    env.bind("trap", BitVec::bool(trap));
    env.bind("control_transfer", BitVec::bool(control_transfer));
    env.bind("stall", BitVec::bool(stall));
    env.bind("trap_target", BitVec::new(32, trap_target as u64));
    env.bind("redirect", BitVec::new(32, redirect as u64));
    env.bind("hold", BitVec::new(32, cur_pc as u64));
    env.bind("seq", BitVec::new(32, cur_pc.wrapping_add(4) as u64));
    env.bind("always", BitVec::bool(true));
    let e = Expr::case(vec![
        (Expr::sig("trap"), Expr::sig("trap_target")),
        (Expr::sig("control_transfer"), Expr::sig("redirect")),
        (Expr::sig("stall"), Expr::sig("hold")),
        (Expr::sig("always"), Expr::sig("seq")),
    ]);
    e.eval(&env).as_u32()
}

/// Select the write-back value latched into MEM/WB: a jump's
/// link address, else memory data for a load, else the ALU/CSR result.
fn select_wb_data(jump: bool, mem_to_reg: bool, pc_plus4: u32, mem_data: u32, alu_result: u32) -> u32 {
    let mut env = Env::new();
    env.bind("jump", BitVec::bool(jump));
    env.bind("mem_to_reg", BitVec::bool(mem_to_reg));
    env.bind("pc_plus4", BitVec::new(32, pc_plus4 as u64));
    env.bind("mem_data", BitVec::new(32, mem_data as u64));
    env.bind("alu_result", BitVec::new(32, alu_result as u64));
    env.bind("always", BitVec::bool(true));
    let e = Expr::case(vec![
        (Expr::sig("jump"), Expr::sig("pc_plus4")),
        (Expr::sig("mem_to_reg"), Expr::sig("mem_data")),
        (Expr::sig("always"), Expr::sig("alu_result")),
    ]);
    e.eval(&env).as_u32()
}

fn alu_op_for(ctrl: &Control, funct3: u32, funct7: u32, m_extension_enabled: bool) -> Option<AluOp> {
    if ctrl.lui || ctrl.auipc || ctrl.jump || ctrl.branch {
        return Some(AluOp::Add);
    }
    if funct7 == funct7::MEXT && m_extension_enabled {
        return Some(match funct3 {
            mext_funct3::MUL => AluOp::Mul,
            mext_funct3::MULH => AluOp::Mulh,
            mext_funct3::MULHSU => AluOp::Mulhsu,
            mext_funct3::MULHU => AluOp::Mulhu,
            mext_funct3::DIV => AluOp::Div,
            mext_funct3::DIVU => AluOp::Divu,
            mext_funct3::REM => AluOp::Rem,
            _ => AluOp::Remu,
        });
    }
    let alt = funct7 == funct7::ALT && !ctrl.alu_src;
    Some(match funct3 {
        alu_funct3::ADD_SUB => {
            if alt {
                AluOp::Sub
            } else {
                AluOp::Add
            }
        }
        alu_funct3::SLL => AluOp::Sll,
        alu_funct3::SLT => AluOp::Slt,
        alu_funct3::SLTU => AluOp::Sltu,
        alu_funct3::XOR => AluOp::Xor,
        alu_funct3::SRL_SRA => {
            if alt {
                AluOp::Sra
            } else {
                AluOp::Srl
            }
        }
        alu_funct3::OR => AluOp::Or,
        alu_funct3::AND => AluOp::And,
        _ => return None,
    })
}

fn rmw_op_for(funct5: u32) -> Option<RmwOp> {
    Some(match funct5 {
        amo_funct5::SWAP => RmwOp::Swap,
        amo_funct5::ADD => RmwOp::Add,
        amo_funct5::XOR => RmwOp::Xor,
        amo_funct5::AND => RmwOp::And,
        amo_funct5::OR => RmwOp::Or,
        amo_funct5::MIN => RmwOp::Min,
        amo_funct5::MAX => RmwOp::Max,
        amo_funct5::MINU => RmwOp::Minu,
        amo_funct5::MAXU => RmwOp::Maxu,
        _ => return None,
    })
}

impl CpuArch for Rv32 {
    type Units = Units;

    fn build_circuit(units: &Units) -> PropCircuit<Self> {
        let mut builder = PropOrderBuilder::new("nex", "cur");
        builder.add_update("decode_wb", "decode_wb_stage");
        builder.add_update("hazard_forward", "decode_wb");
        builder.add_update("execute", "hazard_forward decode_wb");
        builder.add_update("fetch", "execute hazard_forward decode_wb");
        builder.add_update("memory", "fetch execute hazard_forward decode_wb");
        builder.add_update("commit", "memory fetch execute hazard_forward decode_wb");
        let order = builder.build();
        let mut circuit = PropCircuit::new(order);

        let regfile = units.regfile.clone();
        circuit.add_update("decode_wb", move |_unit_in, inter, _nex, _tracer, _unit_out, cur| {
            let decoded = decode::decode(cur.if_id.inst);
            let out = regfile.access(&RegisterFileIn {
                rs1: decoded.rs1,
                rs2: decoded.rs2,
                debug_addr: 0,
                write_enable: cur.mem_wb.reg_write,
                write_addr: cur.mem_wb.rd,
                write_data: cur.mem_wb.wb_data,
            });
            inter.id_rs1 = decoded.rs1;
            inter.id_rs2 = decoded.rs2;
            inter.id_rs1_val = out.rs1_val;
            inter.id_rs2_val = out.rs2_val;
        });

        circuit.add_update("hazard_forward", move |_unit_in, inter, _nex, _tracer, _unit_out, cur| {
            inter.stall = hazard::load_use_stall(cur.id_ex.ctrl.mem_read, cur.id_ex.rd, inter.id_rs1, inter.id_rs2)
                || hazard::amo_use_stall(cur.id_ex.ctrl.amo, cur.id_ex.rd, inter.id_rs1, inter.id_rs2);
            inter.forward_rs1 = forward::select(
                cur.id_ex.rs1,
                cur.ex_mem.ctrl.reg_write,
                cur.ex_mem.rd,
                cur.mem_wb.reg_write,
                cur.mem_wb.rd,
            );
            inter.forward_rs2 = forward::select(
                cur.id_ex.rs2,
                cur.ex_mem.ctrl.reg_write,
                cur.ex_mem.rd,
                cur.mem_wb.reg_write,
                cur.mem_wb.rd,
            );
        });

        let csr = units.csr.clone();
        let dtlb = units.dtlb.clone();
        let memory = units.memory.clone();
        let sv32_enabled = units.config.sv32_enabled;
        let m_extension_enabled = units.config.m_extension_enabled;
        circuit.add_update("execute", move |unit_in, inter, _nex, tracer, _unit_out, cur| {
            let idx = &cur.id_ex;
            let rs1_val = match inter.forward_rs1 {
                ForwardSource::RegFile => idx.rs1_val,
                ForwardSource::ExMem => cur.ex_mem.ex_result,
                ForwardSource::MemWb => cur.mem_wb.wb_data,
            };
            let rs2_val = match inter.forward_rs2 {
                ForwardSource::RegFile => idx.rs2_val,
                ForwardSource::ExMem => cur.ex_mem.ex_result,
                ForwardSource::MemWb => cur.mem_wb.wb_data,
            };

            let cur_priv = cur.priv_mode;
            let mut illegal = false;
            let mut ex_result = 0u32;
            let mut is_amo = false;
            let mut amo_funct5_val = 0u32;
            let mut mem_addr = 0u32;

            if idx.ctrl.system && idx.funct3 != sys_funct3::PRIV {
                // CSR* instructions.
                let addr = decode::sys_imm_of(idx.inst);
                let required_priv = PrivMode::from_bits(((addr >> 8) & 0b11) as u8);
                let read_only = (addr >> 10) & 0b11 == 0b11;
                let zimm = idx.rs1 as u32;
                let (operand, write_suppressed) = match idx.funct3 {
                    sys_funct3::CSRRW => (rs1_val, false),
                    sys_funct3::CSRRS => (rs1_val, idx.rs1 == 0),
                    sys_funct3::CSRRC => (rs1_val, idx.rs1 == 0),
                    sys_funct3::CSRRWI => (zimm, false),
                    sys_funct3::CSRRSI => (zimm, zimm == 0),
                    _ => (zimm, zimm == 0),
                };
                let privileged_enough = priv_rank(cur_priv) >= priv_rank(required_priv);
                let would_write = !matches!(idx.funct3, sys_funct3::CSRRS | sys_funct3::CSRRC | sys_funct3::CSRRSI | sys_funct3::CSRRCI) || !write_suppressed;
                if !privileged_enough || (read_only && would_write) {
                    illegal = true;
                } else {
                    let mut file = csr.borrow_mut();
                    let old = file.read(addr);
                    ex_result = old;
                    if !write_suppressed {
                        let new = match idx.funct3 {
                            sys_funct3::CSRRW | sys_funct3::CSRRWI => operand,
                            sys_funct3::CSRRS | sys_funct3::CSRRSI => old | operand,
                            _ => old & !operand,
                        };
                        file.apply_writes([
                            CsrWrite { addr, data: new, enable: true },
                            CsrWrite::default(),
                            CsrWrite::default(),
                            CsrWrite::default(),
                        ]);
                        if addr == csr::SATP {
                            dtlb.borrow_mut().flush_all();
                        }
                    }
                }
            } else if idx.ctrl.system && idx.funct3 == sys_funct3::PRIV {
                match decode::sys_imm_of(idx.inst) {
                    sys_imm::MRET | sys_imm::SRET => {
                        let is_mret = decode::sys_imm_of(idx.inst) == sys_imm::MRET;
                        let need_priv = if is_mret { PrivMode::Machine } else { PrivMode::Supervisor };
                        if priv_rank(cur_priv) < priv_rank(need_priv) {
                            illegal = true;
                        }
                    }
                    sys_imm::WFI => {} // treated as architectural no-op
                    f if f == sys_imm::ECALL || f == sys_imm::EBREAK => {}
                    f if (f >> 5) == sys_imm::SFENCE_VMA_FUNCT7 => dtlb.borrow_mut().flush_all(),
                    _ => illegal = true,
                }
            } else if idx.ctrl.amo {
                let funct5 = idx.funct7 >> 2;
                is_amo = true;
                amo_funct5_val = funct5;
                if funct5 != amo_funct5::LR && funct5 != amo_funct5::SC && rmw_op_for(funct5).is_none() {
                    illegal = true;
                }
            } else if decode::opcode_of(idx.inst) == crate::isa::opcode::MISC_MEM {
                // FENCE: architectural no-op.
            } else if matches!(
                decode::opcode_of(idx.inst),
                crate::isa::opcode::OP
                    | crate::isa::opcode::OP_IMM
                    | crate::isa::opcode::AUIPC
                    | crate::isa::opcode::LUI
                    | crate::isa::opcode::JAL
                    | crate::isa::opcode::JALR
                    | crate::isa::opcode::BRANCH
                    | crate::isa::opcode::LOAD
                    | crate::isa::opcode::STORE
            ) {
                // Any opcode in this set is guaranteed an ALU op by `alu_op_for`
                // (its funct3 match is exhaustive over all 3-bit encodings);
                // the `None` arm only matters if that invariant ever changes.
                match alu_op_for(&idx.ctrl, idx.funct3, idx.funct7, m_extension_enabled) {
                    Some(op) => {
                        let a = if idx.ctrl.auipc {
                            idx.pc
                        } else if idx.ctrl.lui {
                            0
                        } else {
                            rs1_val
                        };
                        let b = if idx.ctrl.lui || idx.ctrl.auipc {
                            idx.imm
                        } else if idx.ctrl.alu_src {
                            idx.imm
                        } else {
                            rs2_val
                        };
                        ex_result = alu::compute(a, b, op).result;
                    }
                    None => illegal = true,
                }
            } else {
                // Reserved/unimplemented major opcode.
                illegal = true;
            }

            // Address translation for loads/stores/AMOs: the ALU result
            // above (computed with alu_src => rs1+imm) is the virtual
            // address for these forms.
            let is_mem_op = idx.ctrl.mem_read || idx.ctrl.mem_write || idx.ctrl.amo;
            let mut data_fault = false;
            if is_mem_op {
                let vaddr = rs1_val.wrapping_add(idx.imm);
                mem_addr = vaddr;
                if sv32_enabled {
                    let satp = csr.borrow().satp;
                    if satp >> 31 != 0 {
                        let kind = if idx.ctrl.mem_write || (idx.ctrl.amo && amo_funct5_val != amo_funct5::LR) {
                            AccessKind::Store
                        } else {
                            AccessKind::Load
                        };
                        let root_ppn = satp & 0x3f_ffff;
                        let sum = (csr.borrow().mstatus >> 18) & 1 != 0;
                        let user = cur_priv == PrivMode::User;
                        match mmu::translate(&mut dtlb.borrow_mut(), &memory, root_ppn, vaddr, kind, user, sum) {
                            Ok((phys, hit)) => {
                                mem_addr = phys;
                                tracer.fire(if hit { TunnelEvent::TlbHit("data") } else { TunnelEvent::TlbFill("data") });
                            }
                            Err(_) => data_fault = true,
                        }
                    }
                }
            }

            let branch_taken = idx.ctrl.branch && branch::taken(idx.funct3, rs1_val, rs2_val);
            let jump_target = if idx.ctrl.jalr {
                (rs1_val.wrapping_add(idx.imm)) & !1
            } else {
                idx.pc.wrapping_add(idx.imm)
            };

            let pending_irq = pending_interrupt(
                csr.borrow().mstatus,
                csr.borrow().mie,
                csr.borrow().mip
                    | ((unit_in.irq_software as u32) << 3)
                    | ((unit_in.irq_timer as u32) << 7)
                    | ((unit_in.irq_external as u32) << 11),
                csr.borrow().mideleg,
                cur_priv,
            );

            let sync_cause = if illegal {
                Some(cause::ILLEGAL_INSTRUCTION)
            } else if idx.fetch_fault {
                Some(cause::INSTRUCTION_PAGE_FAULT)
            } else if idx.ctrl.system && idx.funct3 == sys_funct3::PRIV && decode::sys_imm_of(idx.inst) == sys_imm::ECALL {
                Some(match cur_priv {
                    PrivMode::User => cause::ECALL_FROM_U,
                    PrivMode::Supervisor => cause::ECALL_FROM_S,
                    PrivMode::Machine => cause::ECALL_FROM_M,
                })
            } else if idx.ctrl.system && idx.funct3 == sys_funct3::PRIV && decode::sys_imm_of(idx.inst) == sys_imm::EBREAK {
                Some(cause::BREAKPOINT)
            } else if data_fault {
                Some(if idx.ctrl.mem_write || idx.ctrl.amo {
                    cause::STORE_AMO_PAGE_FAULT
                } else {
                    cause::LOAD_PAGE_FAULT
                })
            } else {
                None
            };

            let is_xret = idx.ctrl.system
                && idx.funct3 == sys_funct3::PRIV
                && !illegal
                && matches!(decode::sys_imm_of(idx.inst), sys_imm::MRET | sys_imm::SRET);

            let trap_cause = pending_irq.or(sync_cause);

            let mut redirect_pc = jump_target;
            let mut priv_mode_next = cur_priv;

            if let Some(tc) = trap_cause {
                tracer.fire(TunnelEvent::TrapEntry(tc as u32));
                let delegate_to_s = cur_priv != PrivMode::Machine
                    && if tc & cause::INTERRUPT_BIT != 0 {
                        (csr.borrow().mideleg >> (tc & 0x1f)) & 1 != 0
                    } else {
                        (csr.borrow().medeleg >> tc) & 1 != 0
                    };
                let mut file = csr.borrow_mut();
                if delegate_to_s {
                    file.sepc = idx.pc & !0b11;
                    file.scause = tc as u32;
                    file.stval = 0;
                    let spie = (file.mstatus >> 1) & 1;
                    let new_status = (file.mstatus & !((1 << 1) | (1 << 5) | (1 << 8)))
                        | (spie << 5)
                        | ((cur_priv as u32 & 1) << 8);
                    file.mstatus = new_status;
                    redirect_pc = file.stvec & !0b11;
                } else {
                    file.mepc = idx.pc & !0b11;
                    file.mcause = tc as u32;
                    file.mtval = 0;
                    let mpie = (file.mstatus >> 3) & 1;
                    let new_status = (file.mstatus & !((1 << 3) | (1 << 7) | (0b11 << 11)))
                        | (mpie << 7)
                        | ((cur_priv as u32) << 11);
                    file.mstatus = new_status;
                    redirect_pc = file.mtvec & !0b11;
                }
                priv_mode_next = if delegate_to_s { PrivMode::Supervisor } else { PrivMode::Machine };
            } else if is_xret {
                let is_mret = decode::sys_imm_of(idx.inst) == sys_imm::MRET;
                let mut file = csr.borrow_mut();
                if is_mret {
                    let mpp = (file.mstatus >> 11) & 0b11;
                    let mpie = (file.mstatus >> 7) & 1;
                    file.mstatus = (file.mstatus & !((1 << 3) | (1 << 7) | (0b11 << 11))) | (mpie << 3) | (1 << 7);
                    redirect_pc = file.mepc;
                    priv_mode_next = PrivMode::from_bits(mpp as u8);
                } else {
                    let spp = (file.mstatus >> 8) & 1;
                    let spie = (file.mstatus >> 5) & 1;
                    file.mstatus = (file.mstatus & !((1 << 1) | (1 << 5) | (1 << 8))) | (spie << 1) | (1 << 5);
                    redirect_pc = file.sepc;
                    priv_mode_next = PrivMode::from_bits(spp as u8);
                }
                tracer.fire(TunnelEvent::XRet(priv_mode_next.bits()));
            }

            let control_transfer = trap_cause.is_some() || is_xret || branch_taken || idx.ctrl.jump;
            if !(trap_cause.is_some() || is_xret) && (branch_taken || idx.ctrl.jump) {
                redirect_pc = jump_target;
            }

            inter.control_transfer = control_transfer;
            inter.redirect_pc = redirect_pc;
            inter.priv_mode_next = priv_mode_next;

            // ex_result carries either the translated memory address or the
            // plain ALU/CSR result, whichever this instruction needed.
            inter.ex_mem_next = ExMem {
                pc: idx.pc,
                inst: idx.inst,
                rd: idx.rd,
                funct3: idx.funct3,
                ctrl: idx.ctrl,
                ex_result: if is_mem_op { mem_addr } else { ex_result },
                store_data: rs2_val,
                pc_plus4: idx.pc.wrapping_add(4),
                trap_taken: trap_cause.is_some(),
                is_amo,
                amo_funct5: amo_funct5_val,
            };
        });

        let itlb = units.itlb.clone();
        let memory_f = units.memory.clone();
        let csr_f = units.csr.clone();
        let sv32_enabled_f = units.config.sv32_enabled;
        circuit.add_update("fetch", move |_unit_in, inter, _nex, tracer, _unit_out, cur| {
            let next_pc = select_next_pc(inter.ex_mem_next.trap_taken, inter.control_transfer, inter.stall, inter.redirect_pc, inter.redirect_pc, cur.pc);
            let mut fault = false;
            let mut inst = crate::isa::NOP_INSTRUCTION;
            if !inter.stall || inter.control_transfer {
                let mut fetch_addr = next_pc;
                if sv32_enabled_f {
                    let satp = csr_f.borrow().satp;
                    if satp >> 31 != 0 {
                        let root_ppn = satp & 0x3f_ffff;
                        let user = cur.priv_mode == PrivMode::User;
                        match mmu::translate(&mut itlb.borrow_mut(), &memory_f, root_ppn, next_pc, AccessKind::Fetch, user, false) {
                            Ok((phys, hit)) => {
                                fetch_addr = phys;
                                tracer.fire(if hit { TunnelEvent::TlbHit("instruction") } else { TunnelEvent::TlbFill("instruction") });
                            }
                            Err(_) => fault = true,
                        }
                    }
                }
                if !fault {
                    inst = memory_f.read_word(fetch_addr);
                }
            }
            inter.next_pc = next_pc;
            inter.next_if_id = IfId { pc: next_pc, inst, fetch_fault: fault };
        });

        let memory_m = units.memory.clone();
        let reservation_m = units.reservation.clone();
        circuit.add_update("memory", move |_unit_in, inter, _nex, tracer, _unit_out, cur| {
            let em = &cur.ex_mem;
            let mut wb_data = em.ex_result;
            if !em.trap_taken {
                if em.is_amo {
                    let funct5 = em.amo_funct5;
                    if funct5 == amo_funct5::LR {
                        reservation_m.borrow_mut().load_reserved(em.ex_result);
                        wb_data = memory_m.read_word(em.ex_result);
                    } else if funct5 == amo_funct5::SC {
                        let ok = reservation_m.borrow_mut().store_conditional(em.ex_result);
                        if ok {
                            memory_m.write(em.ex_result, em.store_data, mem_funct3::W);
                        }
                        tracer.fire(if ok { TunnelEvent::ScSuccess } else { TunnelEvent::ScFail });
                        wb_data = if ok { 0 } else { 1 };
                    } else if let Some(op) = rmw_op_for(funct5) {
                        let old = memory_m.read_word(em.ex_result);
                        let new = crate::units::amo::rmw_new_value(op, old, em.store_data);
                        memory_m.write(em.ex_result, new, mem_funct3::W);
                        reservation_m.borrow_mut().notify_write();
                        wb_data = old;
                    }
                } else if em.ctrl.mem_write {
                    memory_m.write(em.ex_result, em.store_data, em.funct3);
                    reservation_m.borrow_mut().notify_write();
                } else if em.ctrl.mem_read {
                    let raw = memory_m.read_word(em.ex_result & !0b11);
                    let shift = (em.ex_result & 0b11) * 8;
                    wb_data = load_extend(raw, shift, em.funct3);
                }
            }
            let wb = select_wb_data(em.ctrl.jump, em.ctrl.mem_to_reg, em.pc_plus4, wb_data, em.ex_result);
            inter.mem_wb_next = MemWb {
                pc: em.pc,
                inst: em.inst,
                rd: em.rd,
                reg_write: em.ctrl.reg_write && !em.trap_taken,
                wb_data: wb,
            };
        });

        circuit.add_update("commit", move |_unit_in, inter, nex, tracer, _unit_out, cur| {
            nex.pc = inter.next_pc;
            nex.if_id = if inter.stall && !hazard::flush_if_id(inter.control_transfer) {
                tracer.fire(TunnelEvent::Stall("if_id"));
                cur.if_id
            } else {
                if hazard::flush_if_id(inter.control_transfer) {
                    tracer.fire(TunnelEvent::Flush("if_id"));
                }
                inter.next_if_id
            };
            let decoded = decode::decode(cur.if_id.inst);
            nex.id_ex = if hazard::flush_id_ex(inter.control_transfer, inter.stall) {
                tracer.fire(TunnelEvent::Flush("id_ex"));
                IdEx::default()
            } else {
                if inter.stall {
                    tracer.fire(TunnelEvent::Stall("id_ex"));
                }
                IdEx {
                    pc: cur.if_id.pc,
                    inst: cur.if_id.inst,
                    rs1: decoded.rs1,
                    rs2: decoded.rs2,
                    rd: decoded.rd,
                    imm: decode::imm_of(cur.if_id.inst),
                    funct3: decoded.funct3,
                    funct7: decoded.funct7,
                    ctrl: decoded.ctrl,
                    rs1_val: inter.id_rs1_val,
                    rs2_val: inter.id_rs2_val,
                    fetch_fault: cur.if_id.fetch_fault,
                }
            };
            nex.ex_mem = inter.ex_mem_next;
            nex.mem_wb = inter.mem_wb_next;
            nex.priv_mode = inter.priv_mode_next;
        });

        circuit
    }
}

fn priv_rank(p: PrivMode) -> u8 {
    match p {
        PrivMode::User => 0,
        PrivMode::Supervisor => 1,
        PrivMode::Machine => 2,
    }
}

/// Zero/sign-extend a just-read word down to the funct3-selected load width.
fn load_extend(raw: u32, shift: u32, funct3: u32) -> u32 {
    match funct3 {
        mem_funct3::B => (((raw >> shift) as i8) as i32) as u32,
        mem_funct3::H => (((raw >> shift) as i16) as i32) as u32,
        mem_funct3::BU => (raw >> shift) & 0xff,
        mem_funct3::HU => (raw >> shift) & 0xffff,
        _ => raw,
    }
}

impl CpuSim for PipeSim<Rv32> {
    fn initiate_next_cycle(&mut self) {
        if self.cur_unit_in.rst {
            self.cur_state = Latches::reset(self.units.config.reset_vector);
        } else {
            self.cur_state = self.nex_state;
        }
        self.cycle_count += 1;
    }

    fn propagate_signals(&mut self) {
        let unit_out = self.cur_unit_out.clone();
        let mut propagator = self.circuit.updates.make_propagator(
            &mut self.cur_unit_in,
            unit_out,
            &mut self.nex_state,
            &self.cur_state,
            &mut self.cur_inter,
        );
        let order: Vec<_> = self.circuit.order.iter().collect();
        for (_is_unit, id) in order {
            propagator.run_combinatorial_logic(id);
        }
        let (_out, tracer) = propagator.finalize();
        self.last_trace = tracer;

        self.cur_unit_out = CpuOut {
            debug_pc: self.cur_state.pc as u64 as u32,
            debug_inst: self.cur_state.if_id.inst,
            debug_x1: self.units.regfile.snapshot()[1].1 as u32,
            debug_x2: self.units.regfile.snapshot()[2].1 as u32,
            debug_x10: self.units.regfile.snapshot()[10].1 as u32,
            debug_x11: self.units.regfile.snapshot()[11].1 as u32,
            debug_reg_data: self.units.regfile.snapshot()[self.cur_unit_in.debug_reg_addr as usize].1 as u32,
        };
    }

    fn program_counter(&self) -> u64 {
        self.cur_state.pc as u64
    }

    fn is_terminate(&self) -> bool {
        self.terminate
    }

    fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    fn registers(&self) -> Vec<(u8, u64)> {
        self.units.regfile.snapshot()
    }

    fn get_stage_info(&self) -> Vec<StageInfo> {
        vec![
            StageInfo {
                name: "IF",
                signals: vec![("pc".into(), format!("{:#x}", self.cur_state.pc))],
            },
            StageInfo {
                name: "ID",
                signals: vec![("inst".into(), format!("{:#010x}", self.cur_state.if_id.inst))],
            },
            StageInfo {
                name: "EX",
                signals: vec![("inst".into(), format!("{:#010x}", self.cur_state.id_ex.inst))],
            },
            StageInfo {
                name: "MEM",
                signals: vec![
                    ("inst".into(), format!("{:#010x}", self.cur_state.ex_mem.inst)),
                    ("result".into(), format!("{:#010x}", self.cur_state.ex_mem.ex_result)),
                ],
            },
            StageInfo {
                name: "WB",
                signals: vec![
                    ("inst".into(), format!("{:#010x}", self.cur_state.mem_wb.inst)),
                    ("data".into(), format!("{:#010x}", self.cur_state.mem_wb.wb_data)),
                ],
            },
        ]
    }

    fn step(&mut self) {
        self.initiate_next_cycle();
        self.propagate_signals();
    }
}

